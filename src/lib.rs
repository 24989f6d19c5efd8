pub mod board;
pub mod book;
pub mod error;
pub mod eval;
pub mod fen;
pub mod game;
pub mod movegen;
pub mod options;
pub mod search;
pub mod time;
pub mod utils;
pub mod worker;

pub fn init() {
    utils::init_attack_tables();
}
