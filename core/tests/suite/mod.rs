// Aggregates all integration tests as modules.
mod reconnect;
