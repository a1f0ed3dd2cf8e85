//! トークン検証器: 鍵解決・署名/クレーム検証・認可クレームチェックを
//! 1 つの検証結果にまとめる。

use crate::claims::{check_claim, ClaimShape, Payload, RequiredClaims};
use crate::config::{ConfigError, TrustConfig};
use crate::error::VerifyError;
use crate::resolver::KeyResolver;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

/// TokenVerifier は 1 トークンと 1 組のクレーム要求に対する検証結果を生成する。
///
/// 検証は線形のステージで進み、各ステージの失敗で終端する:
/// 鍵解決 → 署名・アルゴリズム・オーディエンス・発行者・有効期限の検証 →
/// スコープチェック → パーミッションチェック。
pub struct TokenVerifier {
    config: TrustConfig,
    resolver: KeyResolver,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    /// 新しい TokenVerifier を生成する。
    ///
    /// 設定値はここで検証し、不正な設定は検証呼び出しまで持ち越さない。
    pub fn new(config: TrustConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let resolver = KeyResolver::new(
            &config.jwks_url(),
            Duration::from_secs(config.jwks_cache_ttl_secs),
            Duration::from_secs(config.jwks_timeout_secs),
        )
        .map_err(|e| ConfigError::Validation(e.to_string()))?;

        Ok(Self { config, resolver })
    }

    /// カスタムリゾルバを使う TokenVerifier を生成する（テスト用）。
    pub fn with_resolver(config: TrustConfig, resolver: KeyResolver) -> Self {
        Self { config, resolver }
    }

    /// トークンを検証し、成功時はデコード済みクレームペイロードを返す。
    ///
    /// 成功は、署名が有効で、発行者・オーディエンス・アルゴリズムが設定と
    /// 一致し、指定された全クレーム要求を満たしたことを意味する。
    pub async fn verify(
        &self,
        token: &str,
        required: &RequiredClaims,
    ) -> Result<Payload, VerifyError> {
        let key = self.resolver.resolve(token).await?;

        let payload = self.decode_payload(token, &key)?;

        if let Some(ref scopes) = required.scopes {
            let values: Vec<String> = scopes
                .split(' ')
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            check_claim(&payload, "scope", ClaimShape::SpaceDelimited, &values)?;
        }

        if let Some(ref permissions) = required.permissions {
            check_claim(&payload, "permissions", ClaimShape::Sequence, permissions)?;
        }

        Ok(payload)
    }

    /// 署名とレジスタードクレーム（alg / aud / iss / exp / nbf）を検証し、
    /// ペイロードをデコードする。
    fn decode_payload(&self, token: &str, key: &DecodingKey) -> Result<Payload, VerifyError> {
        let first = self.config.algorithms.first().copied().ok_or_else(|| {
            VerifyError::TokenInvalid("allowed algorithm list is empty".into())
        })?;

        let mut validation = Validation::new(first);
        // iss / aud は必須。exp / nbf は存在する場合のみ検証する
        validation.set_required_spec_claims(&["iss", "aud"]);
        validation.algorithms = self.config.algorithms.clone();
        validation.set_audience(&[&self.config.audience]);
        validation.set_issuer(&[&self.config.issuer]);
        validation.leeway = self.config.leeway_secs;

        let data = decode::<Map<String, Value>>(token, key, &validation).map_err(|e| {
            debug!(error = %e, "token failed signature or claim validation");
            VerifyError::TokenInvalid(e.to_string())
        })?;

        Ok(data.claims)
    }
}
