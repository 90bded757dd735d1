use std::path::PathBuf;

use clap::error::ErrorKind;
use redis_aof::config::{Config, FsyncPolicy, DEFAULT_ADDR, DEFAULT_AOF_FILENAME};

#[test]
fn test_defaults() {
    let config = Config::from_args(["redis-aof"]).unwrap();

    assert_eq!(config, Config::default());
    assert_eq!(config.addr, DEFAULT_ADDR);
    assert_eq!(config.appendfilename, PathBuf::from(DEFAULT_AOF_FILENAME));
    assert_eq!(config.appendfsync, FsyncPolicy::EverySec);
}

#[test]
fn test_flags() {
    let test_cases = vec![
        (
            vec!["redis-aof", "--addr", "0.0.0.0:7000"],
            Config {
                addr: "0.0.0.0:7000".to_string(),
                ..Config::default()
            },
        ),
        (
            vec!["redis-aof", "--appendfilename", "/tmp/data.aof"],
            Config {
                appendfilename: PathBuf::from("/tmp/data.aof"),
                ..Config::default()
            },
        ),
        (
            vec!["redis-aof", "--appendfsync", "always"],
            Config {
                appendfsync: FsyncPolicy::Always,
                ..Config::default()
            },
        ),
        (
            vec!["redis-aof", "--appendfsync", "no", "--log-level", "debug"],
            Config {
                appendfsync: FsyncPolicy::No,
                log_level: "debug".to_string(),
                ..Config::default()
            },
        ),
    ];

    for (args, expected) in test_cases {
        assert_eq!(Config::from_args(args.clone()).unwrap(), expected, "args {:?}", args);
    }
}

#[test]
fn test_invalid_flags() {
    let test_cases = vec![
        (vec!["redis-aof", "--appendfsync", "sometimes"], ErrorKind::InvalidValue),
        (vec!["redis-aof", "--port", "6379"], ErrorKind::UnknownArgument),
        (vec!["redis-aof", "--addr"], ErrorKind::InvalidValue),
    ];

    for (args, expected) in test_cases {
        let error = Config::from_args(args.clone()).unwrap_err();
        assert_eq!(error.kind(), expected, "args {:?}", args);
    }
}
