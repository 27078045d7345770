// Aggregates all former standalone integration tests as modules.
mod commit;
mod scenario;
