/*
 * Responsibility
 * - middleware の公開インターフェース
 * - auth: authentication / authorization stage
 * - cors, http, security_headers: transport 寄りの横断的関心事
 */
pub mod auth;
pub mod cors;
pub mod http;
pub mod security_headers;
