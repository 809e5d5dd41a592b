/// Builds a `JsonMap` from `key => value` pairs; values go through `serde_json::json!`.
#[macro_export]
macro_rules! json_map {
    ($($key:expr => $value:expr),* $(,)?) => {{
        let mut mp = $crate::types::response::JsonMap::new();
        $(mp.insert($key.into(), serde_json::json!($value));)*
        mp
    }};
}
