//! # Equipment Interface
//!
//! This module defines the interface structures which will be sent between equipment clients and
//! servers.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod arm;
