//! 信頼設定: 発行者・オーディエンス・許可アルゴリズムを保持する設定構造体。

use jsonwebtoken::Algorithm;
use serde::Deserialize;
use std::str::FromStr;

/// algorithms のデフォルト値（RS256 のみ）。
fn default_algorithms() -> Vec<Algorithm> {
    vec![Algorithm::RS256]
}

/// leeway_secs のデフォルト値（60 秒）。
fn default_leeway_secs() -> u64 {
    60
}

/// jwks_timeout_secs のデフォルト値（10 秒）。
fn default_jwks_timeout_secs() -> u64 {
    10
}

/// jwks_cache_ttl_secs のデフォルト値（600 秒）。
fn default_jwks_cache_ttl_secs() -> u64 {
    600
}

/// ConfigError は信頼設定の読み込み・検証エラーを表す。
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// 必須の環境変数が未設定。
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// アルゴリズム名が解釈できない。
    #[error("unsupported algorithm: {0}")]
    InvalidAlgorithm(String),

    /// 設定値の検証に失敗した。
    #[error("validation error: {0}")]
    Validation(String),
}

/// TrustConfig はトークン検証の信頼設定を表す。
///
/// プロセス起動時に一度だけ読み込み、以後は不変として扱う。
/// YAML / JSON の設定ストアから serde でデシリアライズ可能。
#[derive(Debug, Clone, Deserialize)]
pub struct TrustConfig {
    /// 鍵セット公開元のドメイン。JWKS URL の組み立てに使用する。
    /// 例: `your-tenant.auth0.com`
    pub domain: String,

    /// このサービスを示すオーディエンス（aud クレームの期待値）。
    pub audience: String,

    /// トークン発行者 URL（iss クレームの期待値）。
    pub issuer: String,

    /// 許可する署名アルゴリズムの一覧（デフォルト: RS256 のみ）。
    #[serde(default = "default_algorithms")]
    pub algorithms: Vec<Algorithm>,

    /// exp / nbf 検証時に許容するクロックスキュー秒数（デフォルト: 60 秒）。
    #[serde(default = "default_leeway_secs")]
    pub leeway_secs: u64,

    /// JWKS 取得の HTTP タイムアウト秒数（デフォルト: 10 秒）。
    #[serde(default = "default_jwks_timeout_secs")]
    pub jwks_timeout_secs: u64,

    /// JWKS キャッシュの TTL 秒数（デフォルト: 600 秒）。
    #[serde(default = "default_jwks_cache_ttl_secs")]
    pub jwks_cache_ttl_secs: u64,
}

impl TrustConfig {
    /// 必須項目のみで TrustConfig を生成する。
    ///
    /// その他の項目はデフォルト値が使用される。
    pub fn new(domain: &str, audience: &str, issuer: &str) -> Self {
        Self {
            domain: domain.to_string(),
            audience: audience.to_string(),
            issuer: issuer.to_string(),
            algorithms: default_algorithms(),
            leeway_secs: default_leeway_secs(),
            jwks_timeout_secs: default_jwks_timeout_secs(),
            jwks_cache_ttl_secs: default_jwks_cache_ttl_secs(),
        }
    }

    /// 環境変数から TrustConfig を読み込む。
    ///
    /// `DOMAIN` / `API_AUDIENCE` / `ISSUER` は必須。未設定の場合はエラーを返し、
    /// プレースホルダ値へのフォールバックは行わない。
    /// `ALGORITHMS` は空白またはカンマ区切りのアルゴリズム名（省略時 RS256）。
    pub fn from_env() -> Result<Self, ConfigError> {
        let domain = require_env("DOMAIN")?;
        let audience = require_env("API_AUDIENCE")?;
        let issuer = require_env("ISSUER")?;

        let mut config = Self::new(&domain, &audience, &issuer);
        if let Ok(raw) = std::env::var("ALGORITHMS") {
            config.algorithms = parse_algorithms(&raw)?;
        }

        Ok(config)
    }

    /// 許可アルゴリズムを設定する。
    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.algorithms = algorithms;
        self
    }

    /// クロックスキュー許容秒数を設定する。
    pub fn with_leeway_secs(mut self, secs: u64) -> Self {
        self.leeway_secs = secs;
        self
    }

    /// JWKS タイムアウト秒数を設定する。
    pub fn with_jwks_timeout_secs(mut self, secs: u64) -> Self {
        self.jwks_timeout_secs = secs;
        self
    }

    /// JWKS キャッシュ TTL 秒数を設定する。
    pub fn with_jwks_cache_ttl_secs(mut self, secs: u64) -> Self {
        self.jwks_cache_ttl_secs = secs;
        self
    }

    /// 鍵セット公開エンドポイントの URL を返す。
    pub fn jwks_url(&self) -> String {
        format!("https://{}/.well-known/jwks.json", self.domain)
    }

    /// 設定値のバリデーション。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.domain.is_empty() {
            return Err(ConfigError::Validation("domain is required".into()));
        }
        if self.audience.is_empty() {
            return Err(ConfigError::Validation("audience is required".into()));
        }
        if self.issuer.is_empty() {
            return Err(ConfigError::Validation("issuer is required".into()));
        }
        if self.algorithms.is_empty() {
            return Err(ConfigError::Validation(
                "at least one algorithm is required".into(),
            ));
        }
        Ok(())
    }
}

/// 環境変数を取得する。未設定または空文字列の場合はエラー。
fn require_env(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

/// 空白またはカンマ区切りのアルゴリズム名一覧をパースする。
fn parse_algorithms(raw: &str) -> Result<Vec<Algorithm>, ConfigError> {
    let mut algorithms = Vec::new();
    for name in raw.split([' ', ',']).filter(|s| !s.is_empty()) {
        let algorithm = Algorithm::from_str(name)
            .map_err(|_| ConfigError::InvalidAlgorithm(name.to_string()))?;
        algorithms.push(algorithm);
    }
    if algorithms.is_empty() {
        return Err(ConfigError::InvalidAlgorithm(raw.to_string()));
    }
    Ok(algorithms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sets_defaults() {
        let config = TrustConfig::new("your.domain.com", "your.audience.com", "https://your.domain.com/");

        assert_eq!(config.domain, "your.domain.com");
        assert_eq!(config.audience, "your.audience.com");
        assert_eq!(config.issuer, "https://your.domain.com/");
        assert_eq!(config.algorithms, vec![Algorithm::RS256]);
        assert_eq!(config.leeway_secs, 60);
        assert_eq!(config.jwks_timeout_secs, 10);
        assert_eq!(config.jwks_cache_ttl_secs, 600);
    }

    #[test]
    fn test_jwks_url() {
        let config = TrustConfig::new("your.domain.com", "aud", "iss");
        assert_eq!(
            config.jwks_url(),
            "https://your.domain.com/.well-known/jwks.json"
        );
    }

    #[test]
    fn test_builders() {
        let config = TrustConfig::new("d", "a", "i")
            .with_algorithms(vec![Algorithm::RS256, Algorithm::RS384])
            .with_leeway_secs(0)
            .with_jwks_timeout_secs(3)
            .with_jwks_cache_ttl_secs(30);

        assert_eq!(config.algorithms.len(), 2);
        assert_eq!(config.leeway_secs, 0);
        assert_eq!(config.jwks_timeout_secs, 3);
        assert_eq!(config.jwks_cache_ttl_secs, 30);
    }

    #[test]
    fn test_parse_algorithms() {
        assert_eq!(
            parse_algorithms("RS256").unwrap(),
            vec![Algorithm::RS256]
        );
        assert_eq!(
            parse_algorithms("RS256 RS384").unwrap(),
            vec![Algorithm::RS256, Algorithm::RS384]
        );
        assert_eq!(
            parse_algorithms("RS256,ES256").unwrap(),
            vec![Algorithm::RS256, Algorithm::ES256]
        );
        assert!(parse_algorithms("none").is_err());
        assert!(parse_algorithms("  ").is_err());
    }

    #[test]
    fn test_validate() {
        let config = TrustConfig::new("d", "a", "i");
        assert!(config.validate().is_ok());

        let config = TrustConfig::new("", "a", "i");
        assert!(config.validate().is_err());

        let config = TrustConfig::new("d", "a", "i").with_algorithms(vec![]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serde_defaults_applied() {
        // JSON に任意項目が含まれない場合でもデフォルトが使われる
        let json = r#"{
            "domain": "your.domain.com",
            "audience": "your.audience.com",
            "issuer": "https://your.domain.com/"
        }"#;

        let config: TrustConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.algorithms, vec![Algorithm::RS256]);
        assert_eq!(config.leeway_secs, 60);
        assert_eq!(config.jwks_timeout_secs, 10);
        assert_eq!(config.jwks_cache_ttl_secs, 600);
    }

    #[test]
    fn test_from_env() {
        // 環境変数はプロセス全体で共有されるため、1 つのテストで順に検証する
        std::env::remove_var("DOMAIN");
        std::env::remove_var("API_AUDIENCE");
        std::env::remove_var("ISSUER");
        std::env::remove_var("ALGORITHMS");

        // 必須変数が未設定の場合はエラー（プレースホルダへのフォールバックなし）
        assert!(matches!(
            TrustConfig::from_env(),
            Err(ConfigError::MissingVar("DOMAIN"))
        ));

        std::env::set_var("DOMAIN", "your.domain.com");
        std::env::set_var("API_AUDIENCE", "your.audience.com");
        std::env::set_var("ISSUER", "https://your.domain.com/");

        let config = TrustConfig::from_env().unwrap();
        assert_eq!(config.domain, "your.domain.com");
        assert_eq!(config.algorithms, vec![Algorithm::RS256]);

        std::env::set_var("ALGORITHMS", "RS256 RS384");
        let config = TrustConfig::from_env().unwrap();
        assert_eq!(config.algorithms, vec![Algorithm::RS256, Algorithm::RS384]);

        std::env::set_var("ALGORITHMS", "bogus");
        assert!(TrustConfig::from_env().is_err());

        std::env::remove_var("DOMAIN");
        std::env::remove_var("API_AUDIENCE");
        std::env::remove_var("ISSUER");
        std::env::remove_var("ALGORITHMS");
    }
}
