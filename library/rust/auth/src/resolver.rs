//! 署名鍵リゾルバ: JWKS エンドポイントから公開鍵を取得・キャッシュし、
//! トークンの kid に対応する検証鍵を解決する。

use crate::error::VerifyError;
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// JWKS レスポンスの構造体。
#[derive(Debug, Clone, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

/// 個々の JWK 鍵。
#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: String,
    #[allow(dead_code)]
    kty: String,
    n: String,
    e: String,
}

/// JwkKey は取得した JWK 鍵の公開情報。
#[derive(Debug, Clone)]
pub struct JwkKey {
    pub kid: String,
    pub n: String,
    pub e: String,
}

/// JwksFetcher は JWKS エンドポイントからの鍵取得を抽象化するトレイト。
#[async_trait::async_trait]
pub trait JwksFetcher: Send + Sync {
    async fn fetch_keys(&self, jwks_url: &str) -> Result<Vec<JwkKey>, VerifyError>;
}

/// HttpJwksFetcher は reqwest を使った JwksFetcher の HTTP 実装。
///
/// 鍵セット取得には必ずタイムアウトを課す。タイムアウト超過は
/// 他の取得失敗と同様に `KeyResolution` として返す。
pub struct HttpJwksFetcher {
    client: reqwest::Client,
}

impl HttpJwksFetcher {
    /// 指定タイムアウトの HTTP クライアントを内部で生成する。
    pub fn new(timeout: Duration) -> Result<Self, VerifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VerifyError::KeyResolution(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl JwksFetcher for HttpJwksFetcher {
    async fn fetch_keys(&self, jwks_url: &str) -> Result<Vec<JwkKey>, VerifyError> {
        let resp: JwksResponse = self
            .client
            .get(jwks_url)
            .send()
            .await
            .map_err(|e| VerifyError::KeyResolution(e.to_string()))?
            .error_for_status()
            .map_err(|e| VerifyError::KeyResolution(e.to_string()))?
            .json()
            .await
            .map_err(|e| VerifyError::KeyResolution(e.to_string()))?;

        Ok(resp
            .keys
            .into_iter()
            .map(|k| JwkKey {
                kid: k.kid,
                n: k.n,
                e: k.e,
            })
            .collect())
    }
}

/// JWKS キャッシュ。
struct JwksCache {
    keys: Vec<JwkKey>,
    fetched_at: Instant,
}

/// キャッシュ照会の結果。refreshed は今回の照会でフェッチが発生したかを示す。
struct CacheLookup {
    keys: Vec<JwkKey>,
    refreshed: bool,
}

/// KeyResolver は 1 つの発行者の JWKS エンドポイントを保持し、
/// トークンの kid に対応する検証鍵を解決する。
///
/// 鍵セットは TTL 付きでキャッシュする。同一リゾルバへの同時リフレッシュは
/// write ロックで合流し、実際のフェッチは 1 回だけ発生する。
/// リゾルバは発行者ごとに生成するため、別発行者の鍵を返すことはない。
pub struct KeyResolver {
    jwks_url: String,
    cache_ttl: Duration,
    cache: Arc<RwLock<Option<JwksCache>>>,
    fetcher: Arc<dyn JwksFetcher>,
}

impl KeyResolver {
    /// HTTP フェッチャーを使う KeyResolver を生成する。
    pub fn new(
        jwks_url: &str,
        cache_ttl: Duration,
        fetch_timeout: Duration,
    ) -> Result<Self, VerifyError> {
        Ok(Self::with_fetcher(
            jwks_url,
            cache_ttl,
            Arc::new(HttpJwksFetcher::new(fetch_timeout)?),
        ))
    }

    /// カスタムフェッチャーを使う KeyResolver を生成する（テスト用）。
    pub fn with_fetcher(
        jwks_url: &str,
        cache_ttl: Duration,
        fetcher: Arc<dyn JwksFetcher>,
    ) -> Self {
        Self {
            jwks_url: jwks_url.to_string(),
            cache_ttl,
            cache: Arc::new(RwLock::new(None)),
            fetcher,
        }
    }

    /// トークンの kid に対応する検証鍵を解決する。
    ///
    /// ヘッダーは未検証のまま読む。署名検証前の kid 参照のみに使用するため安全。
    /// キャッシュ済み鍵セットに kid が見つからない場合は、鍵ローテーションを
    /// 考慮して TTL 内でも一度だけ再取得してから照合し直す。
    pub async fn resolve(&self, token: &str) -> Result<DecodingKey, VerifyError> {
        let started = Instant::now();

        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| VerifyError::TokenMalformed(e.to_string()))?;

        let kid = header.kid.ok_or_else(|| {
            VerifyError::KeyResolution("token header does not declare a kid".into())
        })?;

        let lookup = self.get_keys().await?;
        let jwk = match find_key(&lookup.keys, &kid) {
            Some(jwk) => jwk,
            None if !lookup.refreshed => {
                warn!(%kid, "kid not found in cached key set, refreshing early");
                let keys = self.refresh_keys(started).await?;
                find_key(&keys, &kid).ok_or_else(|| {
                    VerifyError::KeyResolution(format!("no matching key for kid: {kid}"))
                })?
            }
            None => {
                return Err(VerifyError::KeyResolution(format!(
                    "no matching key for kid: {kid}"
                )));
            }
        };

        DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
            .map_err(|e| VerifyError::KeyResolution(e.to_string()))
    }

    /// キャッシュから鍵セットを取得する。TTL を超えている場合は再取得する。
    async fn get_keys(&self) -> Result<CacheLookup, VerifyError> {
        // Read ロックでキャッシュを確認
        {
            let cache = self.cache.read().await;
            if let Some(ref c) = *cache {
                if c.fetched_at.elapsed() < self.cache_ttl {
                    return Ok(CacheLookup {
                        keys: c.keys.clone(),
                        refreshed: false,
                    });
                }
            }
        }

        // Write ロックで再取得。同時リフレッシュはここで合流する。
        let mut cache = self.cache.write().await;

        // ダブルチェック: 先行したリフレッシュの結果をそのまま使う
        if let Some(ref c) = *cache {
            if c.fetched_at.elapsed() < self.cache_ttl {
                return Ok(CacheLookup {
                    keys: c.keys.clone(),
                    refreshed: false,
                });
            }
        }

        let keys = self.fetcher.fetch_keys(&self.jwks_url).await?;
        debug!(url = %self.jwks_url, count = keys.len(), "fetched key set");

        *cache = Some(JwksCache {
            keys: keys.clone(),
            fetched_at: Instant::now(),
        });

        Ok(CacheLookup {
            keys,
            refreshed: true,
        })
    }

    /// TTL を無視して鍵セットを再取得し、キャッシュを更新する。
    ///
    /// `since` 以降に別の呼び出しが再取得を済ませていた場合は、
    /// 再フェッチせずその鍵セットを返す。同時リフレッシュはここで合流する。
    async fn refresh_keys(&self, since: Instant) -> Result<Vec<JwkKey>, VerifyError> {
        let mut cache = self.cache.write().await;

        // ダブルチェック: since 以降に更新されたキャッシュをそのまま使う
        if let Some(ref c) = *cache {
            if c.fetched_at > since {
                return Ok(c.keys.clone());
            }
        }

        let keys = self.fetcher.fetch_keys(&self.jwks_url).await?;
        debug!(url = %self.jwks_url, count = keys.len(), "refreshed key set after kid miss");

        *cache = Some(JwksCache {
            keys: keys.clone(),
            fetched_at: Instant::now(),
        });

        Ok(keys)
    }

    /// キャッシュを無効化する。鍵ローテーション時に使用。
    pub async fn invalidate_cache(&self) {
        let mut cache = self.cache.write().await;
        *cache = None;
    }
}

/// 鍵セットから kid に一致する鍵を探す。
fn find_key(keys: &[JwkKey], kid: &str) -> Option<JwkKey> {
    keys.iter().find(|k| k.kid == kid).cloned()
}
