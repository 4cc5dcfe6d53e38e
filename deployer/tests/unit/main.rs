//! Integration tests

mod support;
mod test_email;
mod test_fsm;
mod test_pipeline;
mod test_server;
