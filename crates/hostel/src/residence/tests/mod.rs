mod attendance;
mod common;
mod directory;
mod occupancy;
