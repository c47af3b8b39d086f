//! External service clients.

pub mod flutterwave;
