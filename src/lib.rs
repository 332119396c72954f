pub mod calibration;
pub mod config;
pub mod elo;
pub mod knockout;
pub mod logging;
pub mod match_data;
pub mod parimutuel;
pub mod props;
pub mod roster;
pub mod simulation;
pub mod win_prob;
