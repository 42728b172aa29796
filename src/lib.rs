pub mod commands;
pub mod doctor;
pub mod error;
pub mod fs_utils;
pub mod git;
pub mod gitconfig;
pub mod hasher;
pub mod input;
pub mod paths;
pub mod profiles;
pub mod signing;
pub mod switch;
pub mod ui;
pub mod validation;

#[cfg(test)]
pub mod test_utils;
