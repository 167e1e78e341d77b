/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Six-character lobby join codes.
pub mod join_code;
/// Lobby creation, auto-join and leave.
pub mod lobby_service;
/// Live per-viewer lobby views.
pub mod lobby_view;
/// Profile lookups and updates.
pub mod profile_service;
/// Server-Sent Events streaming of lobby views.
pub mod sse_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
