mod config;
mod test_utils;
