pub mod context;
pub mod customer;
pub mod decision;
pub mod history;
pub mod intent;
pub mod message;
