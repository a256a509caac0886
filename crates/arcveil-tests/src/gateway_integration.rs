//! Gateway integration tests: full HTTP flows through the router
