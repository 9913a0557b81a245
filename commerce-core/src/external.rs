//! Narrow interfaces to excluded collaborators
//!
//! Object storage is consumed only for uploading serialized report
//! artifacts (sweep summaries); it is never on the hot path of a state
//! transition, so failures are logged and swallowed by callers.

use async_trait::async_trait;

/// 보고서/로그 아티팩트 업로드 인터페이스
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// JSON 문서를 지정 키로 업로드
    async fn put_json(&self, key: &str, body: serde_json::Value) -> anyhow::Result<()>;
}

/// 기본 no-op 구현 — 스토리지 미연결 환경(테스트/로컬)용
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopArtifactStore;

#[async_trait]
impl ArtifactStore for NoopArtifactStore {
    async fn put_json(&self, key: &str, _body: serde_json::Value) -> anyhow::Result<()> {
        tracing::trace!(key, "Artifact upload skipped (noop store)");
        Ok(())
    }
}
