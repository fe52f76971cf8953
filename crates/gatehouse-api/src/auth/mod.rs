//! HTTP 인증/인가 계층.
//!
//! - [`authorization_gate`]: `/api` 라우트 앞에서 토큰과 역할을 검사하는 미들웨어
//! - [`CurrentUser`]: 게이트를 통과한 호출자 추출기

mod middleware;

pub use middleware::{authorization_gate, CurrentUser};
