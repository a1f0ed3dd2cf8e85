//! 認可クレーム要求の定義と汎用クレームチェック。

use crate::error::VerifyError;
use serde_json::{Map, Value};

/// デコード済みクレームペイロード。クレーム名から値へのマッピング。
pub type Payload = Map<String, Value>;

/// ClaimShape はクレーム値の期待形式と正規化方法を表す。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimShape {
    /// 空白区切りの単一文字列（scope クレーム）。
    SpaceDelimited,
    /// 文字列の配列（permissions クレーム）。
    Sequence,
}

impl ClaimShape {
    /// クレーム値を照合可能な文字列集合へ正規化する。
    ///
    /// 期待形式に合致しない値は None を返す。
    fn normalize(self, value: &Value) -> Option<Vec<String>> {
        match self {
            Self::SpaceDelimited => value.as_str().map(|s| {
                s.split(' ')
                    .filter(|t| !t.is_empty())
                    .map(String::from)
                    .collect()
            }),
            Self::Sequence => value.as_array().map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            }),
        }
    }
}

/// RequiredClaims は 1 回の検証呼び出しで要求する認可クレームを表す。
///
/// 指定しなかった要求に対応するチェックはスキップされる。
#[derive(Debug, Clone, Default)]
pub struct RequiredClaims {
    /// 空白区切りの必須スコープ。列挙した全スコープの保持を要求する。
    pub scopes: Option<String>,

    /// 必須パーミッションの一覧。全要素の保持を要求する。
    pub permissions: Option<Vec<String>>,
}

impl RequiredClaims {
    /// 要求なし（署名・発行者・オーディエンスのみ検証する）。
    pub fn none() -> Self {
        Self::default()
    }

    /// 必須スコープを設定する。
    pub fn with_scopes(mut self, scopes: &str) -> Self {
        self.scopes = Some(scopes.to_string());
        self
    }

    /// 必須パーミッションを設定する。
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = Some(permissions.into_iter().map(Into::into).collect());
        self
    }
}

/// 汎用クレームチェック: クレーム名・期待形式・必須値の組で検証する。
///
/// クレームが存在しない、または期待形式でない場合は `MissingClaim`。
/// 必須値は指定順に照合し、最初に欠けていた値で `InsufficientClaim` を返す
/// （first-fail。欠落の集約レポートは行わない）。
pub fn check_claim(
    payload: &Payload,
    claim: &str,
    shape: ClaimShape,
    required: &[String],
) -> Result<(), VerifyError> {
    let values = payload
        .get(claim)
        .and_then(|v| shape.normalize(v))
        .ok_or_else(|| VerifyError::MissingClaim {
            claim: claim.to_string(),
        })?;

    for value in required {
        if !values.iter().any(|v| v == value) {
            return Err(VerifyError::InsufficientClaim {
                claim: claim.to_string(),
                value: value.clone(),
            });
        }
    }

    Ok(())
}
