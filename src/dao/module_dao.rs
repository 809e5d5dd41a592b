use super::store::Store;
use crate::model::{
    material::Material,
    module::{Module, NewModule},
};
use crate::types::error::{Error, Result};
use std::sync::Arc;

/// Modules and stored attachments.
#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn Store>,
}

impl Catalog {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn modules(&self) -> Result<Vec<Module>> {
        self.store.list_modules().await
    }

    pub async fn module(&self, module_id: i64) -> Result<Module> {
        self.store
            .get_module(module_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("module {} not found", module_id).as_str()))
    }

    pub async fn create_module(&self, module: NewModule) -> Result<Module> {
        if module.name.trim().is_empty() {
            return Err(Error::bad_request("module name is required"));
        }
        let m = self
            .store
            .insert_module(NewModule {
                name: module.name.trim().to_string(),
                ..module
            })
            .await?;
        tracing::info!("module {} created: {}", m.module_id, m.name);
        Ok(m)
    }

    /// Metadata plus the raw bytes, for downloads.
    pub async fn material(&self, material_id: i64) -> Result<(Material, Vec<u8>)> {
        self.store
            .fetch_material(material_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("material {} not found", material_id).as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::fixtures::Fixture;
    use crate::model::material::Upload;
    use crate::utils::now_millis;

    #[tokio::test]
    async fn modules_and_materials() {
        let fx = Fixture::new();
        let catalog = &fx.state.catalog;
        assert!(catalog
            .create_module(NewModule {
                name: " ".into(),
                ..Default::default()
            })
            .await
            .is_err());
        let m = catalog
            .create_module(NewModule {
                name: "  Operating Systems ".into(),
                tag: Some("OS201".into()),
                description: None,
            })
            .await
            .unwrap();
        assert_eq!(m.name, "Operating Systems");
        assert_eq!(catalog.module(m.module_id).await.unwrap(), m);
        assert_eq!(catalog.modules().await.unwrap().len(), 1);
        assert!(catalog.module(m.module_id + 100).await.unwrap_err().is_not_found());

        let upload = Upload::new("slides.pdf", "application/pdf", vec![7; 16]);
        let stored = fx
            .store
            .insert_material("slides.pdf", &upload, now_millis())
            .await
            .unwrap();
        let (meta, bytes) = catalog.material(stored.material_id).await.unwrap();
        assert_eq!(meta.file_type, "application/pdf");
        assert_eq!(bytes.len(), 16);
        assert!(catalog.material(9999).await.unwrap_err().is_not_found());
    }
}
