// Adapters layer: concrete implementations for external systems.
// The directory HTTP client lives under `client` next to the session it serves.

pub mod storage;
