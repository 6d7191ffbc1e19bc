mod common;
mod intake;
mod listing;
mod transitions;
