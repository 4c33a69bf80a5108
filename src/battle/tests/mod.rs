pub mod common;

mod test_tickets;
