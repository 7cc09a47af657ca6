/*!
 * Security context extractor
 *
 * Responsibility:
 * - リクエスト単位のセキュリティコンテキスト (SecurityContext) を handler に提供する
 * - HTTP / axum 依存は core に閉じ込め、型定義は types に分離する
 *
 * Public API:
 * - SecurityContext
 * - CurrentPrincipal
 */

mod core;
mod types;

pub use core::CurrentPrincipal;
pub use types::SecurityContext;
