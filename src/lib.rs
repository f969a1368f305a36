pub mod case_file;
pub mod context;
pub mod discretize;
pub mod fallback;
pub mod http_client;
pub mod match_data;
pub mod memo;
pub mod prediction;
pub mod predictor_client;
pub mod provider;
pub mod rot;
pub mod session;
pub mod store;
pub mod tags;
pub mod traj_stat;
