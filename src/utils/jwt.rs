use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, Validation};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref VALIDATION: Validation = Validation::new(Algorithm::HS256);
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserToken {
    pub iat: i64, // issued at, unix seconds
    pub exp: i64, // checked by `VALIDATION`
    pub id: i64,
}

/// HS256 tokens minted by the account service; this side only reads them.
#[derive(Clone)]
pub struct TokenCodec {
    secret: Vec<u8>,
    validity: i64,
}

impl TokenCodec {
    pub fn new(secret: &str, validity_secs: i64) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            validity: validity_secs,
        }
    }

    pub fn decode(&self, token: &str) -> Result<UserToken, ErrorKind> {
        let key = DecodingKey::from_secret(self.secret.as_slice());
        let claims = match jsonwebtoken::decode::<UserToken>(token, &key, &*VALIDATION) {
            Ok(res) => res.claims,
            Err(e) => return Err(e.into_kind()),
        };
        // tokens minted for longer than we allow are refused outright
        if claims.exp - claims.iat > self.validity {
            return Err(ErrorKind::InvalidToken);
        }
        Ok(claims)
    }

    #[cfg(test)]
    pub fn issue(&self, id: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = UserToken {
            iat: now,
            exp: now + self.validity,
            id,
        };
        let header = jsonwebtoken::Header::new(Algorithm::HS256);
        let key = jsonwebtoken::EncodingKey::from_secret(self.secret.as_slice());
        jsonwebtoken::encode(&header, &claims, &key).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_own_tokens_only() {
        let codec = TokenCodec::new("k1", 3600);
        let token = codec.issue(42);
        assert_eq!(codec.decode(&token).unwrap().id, 42);
        assert!(TokenCodec::new("k2", 3600).decode(&token).is_err());
        assert!(codec.decode("garbage").is_err());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let codec = TokenCodec::new("k1", -3600);
        let token = codec.issue(1);
        assert!(matches!(codec.decode(&token), Err(ErrorKind::ExpiredSignature)));
    }

    #[test]
    fn overlong_tokens_are_rejected() {
        let token = TokenCodec::new("k1", 7200).issue(1);
        let strict = TokenCodec::new("k1", 3600);
        assert!(matches!(strict.decode(&token), Err(ErrorKind::InvalidToken)));
    }
}
