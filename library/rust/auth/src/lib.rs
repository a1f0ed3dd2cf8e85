//! ode-auth: Bearer トークン検証ライブラリ
//!
//! JWKS エンドポイントから公開鍵を取得し、JWT アクセストークンの署名検証と
//! 認可クレーム（scope / permissions）のチェックを行う。
//! トークンの発行やセッション管理は行わない。検証結果の判定のみを提供する。
//!
//! # 使い方
//!
//! ```ignore
//! use ode_auth::{RequiredClaims, TokenVerifier, TrustConfig};
//!
//! let config = TrustConfig::from_env()?;
//! let verifier = TokenVerifier::new(config)?;
//!
//! let required = RequiredClaims::none().with_scopes("read:messages");
//! match verifier.verify("eyJ...", &required).await {
//!     Ok(payload) => { /* 認可済み。payload はデコード済みクレーム */ }
//!     Err(err) => {
//!         let failure = ode_auth::VerifyFailure::from(err);
//!         // HTTP 層は failure.status と failure.body() をそのまま返す
//!     }
//! }
//! ```

pub mod claims;
pub mod config;
pub mod error;
pub mod resolver;
pub mod verifier;

pub use claims::{check_claim, ClaimShape, Payload, RequiredClaims};
pub use config::{ConfigError, TrustConfig};
pub use error::{VerifyError, VerifyFailure};
pub use resolver::{HttpJwksFetcher, JwkKey, JwksFetcher, KeyResolver};
pub use verifier::TokenVerifier;
