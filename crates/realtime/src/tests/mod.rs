//! Tests fuer Bootstrapper und Session-Handle gegen In-Memory-Doubles
