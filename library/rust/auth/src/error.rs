//! トークン検証エラーの定義と HTTP 境界向けの失敗表現。

use http::StatusCode;
use serde_json::json;

/// VerifyError はトークン検証処理で発生するエラーを表す。
///
/// すべてのエラーは当該呼び出しで終端し、内部でのリトライは行わない。
/// Display 文字列はクライアントに表示可能な原因説明のみを含み、
/// 鍵素材や内部状態は含めない。
#[derive(thiserror::Error, Debug)]
pub enum VerifyError {
    /// トークンが compact JWT として解釈できない。
    #[error("malformed token: {0}")]
    TokenMalformed(String),

    /// 鍵セットが取得できない、または kid に一致する鍵が存在しない。
    #[error("signing key resolution failed: {0}")]
    KeyResolution(String),

    /// 署名・発行者・オーディエンス・アルゴリズム・有効期限のいずれかの検証に失敗した。
    #[error("invalid token: {0}")]
    TokenInvalid(String),

    /// 必須クレームが存在しない、または期待する形式ではない。
    #[error("no claim '{claim}' found in token")]
    MissingClaim { claim: String },

    /// クレームは存在するが要求された値を含まない。
    #[error("insufficient {claim} ({value}), access to this resource is denied")]
    InsufficientClaim { claim: String, value: String },
}

impl VerifyError {
    /// 呼び出し側へ返す安定したエラーコードを返す。
    pub fn code(&self) -> String {
        match self {
            Self::TokenMalformed(_) => "token_malformed".into(),
            Self::KeyResolution(_) => "key_resolution_failed".into(),
            Self::TokenInvalid(_) => "token_invalid".into(),
            Self::MissingClaim { claim } => format!("missing_{claim}"),
            Self::InsufficientClaim { claim, .. } => format!("insufficient_{claim}"),
        }
    }

    /// エラー種別に対応する HTTP ステータスコードを返す。
    ///
    /// InsufficientClaim のみ 403、それ以外は 400。
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InsufficientClaim { .. } => StatusCode::FORBIDDEN,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// VerifyFailure は検証失敗の HTTP 境界向け表現。
///
/// HTTP 層は status をレスポンスステータスに反映し、body() をそのまま返す。
#[derive(Debug)]
pub struct VerifyFailure {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl VerifyFailure {
    /// クライアントへ返す JSON ボディを生成する。
    pub fn body(&self) -> serde_json::Value {
        json!({
            "error": self.code,
            "message": self.message,
        })
    }
}

impl From<&VerifyError> for VerifyFailure {
    fn from(err: &VerifyError) -> Self {
        Self {
            status: err.status(),
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<VerifyError> for VerifyFailure {
    fn from(err: VerifyError) -> Self {
        Self::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_statuses() {
        let err = VerifyError::TokenMalformed("not a jwt".into());
        assert_eq!(err.code(), "token_malformed");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = VerifyError::KeyResolution("unreachable".into());
        assert_eq!(err.code(), "key_resolution_failed");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = VerifyError::TokenInvalid("bad signature".into());
        assert_eq!(err.code(), "token_invalid");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = VerifyError::MissingClaim {
            claim: "scope".into(),
        };
        assert_eq!(err.code(), "missing_scope");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = VerifyError::InsufficientClaim {
            claim: "scope".into(),
            value: "read:messages".into(),
        };
        assert_eq!(err.code(), "insufficient_scope");
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_failure_projection() {
        let err = VerifyError::InsufficientClaim {
            claim: "permissions".into(),
            value: "write:tasks".into(),
        };
        let failure = VerifyFailure::from(err);

        assert_eq!(failure.status, StatusCode::FORBIDDEN);
        assert_eq!(failure.code, "insufficient_permissions");
        assert!(failure.message.contains("write:tasks"));

        let body = failure.body();
        assert_eq!(body["error"], "insufficient_permissions");
        assert!(body["message"].as_str().unwrap().contains("permissions"));
    }
}
