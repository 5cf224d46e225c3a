pub mod bank_account;
pub mod benefit;
pub mod contract;
pub mod employee;
pub mod exchange_rate;
pub mod invoice;
pub mod order;
pub mod payroll;
pub mod product;
pub mod purchase;
pub mod role;
pub mod termination;
pub mod user;
