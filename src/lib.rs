/*!
# Overview
s3mirror is a fast bulk copy tool for S3. It copies every object under a
source prefix to a target prefix, using server-side copy requests so object
data never passes through the machine running it.

## How it works
The source bucket is listed page by page while a pool of copy workers
(`--worker-size`, default 16) issues `CopyObject` requests concurrently.
Each object is retried on failure (`--copy-attempts`, default 3 attempts in
total) and a key that exhausts its attempts is recorded in the final result
instead of aborting the run. Progress is reported at a fixed interval
(`--report-interval-seconds`, default 15).

## As a library
The s3mirror CLI is a thin wrapper over this crate. All CLI arguments can be
passed to the library.

Example usage
=============

```Toml
[dependencies]
s3mirror = "0.3"
tokio = { version = "1", features = ["full"] }
```

```no_run
use s3mirror::Config;
use s3mirror::config::args::parse_from_args;
use s3mirror::pipeline::Pipeline;
use s3mirror::types::token::create_pipeline_cancellation_token;

#[tokio::main]
async fn main() {
    let args = vec![
        "program_name",
        "--worker-size",
        "32",
        "s3://source-bucket/src/",
        "s3://target-bucket/dst/",
    ];

    let config = Config::try_from(parse_from_args(args).unwrap()).unwrap();

    // The cancellation token can be used to stop the pipeline from
    // another task, e.g. a signal handler.
    let cancellation_token = create_pipeline_cancellation_token();
    let mut pipeline = Pipeline::new(config, cancellation_token).await;

    let result = pipeline.run().await;

    println!("succeeded: {}", result.succeeded);
    println!("failed: {}", result.failed);
    for failure in &result.failures {
        println!("{}: {}", failure.key, failure.error);
    }

    // A pipeline error is one that stopped the run itself, such as a
    // failed source listing.
    if pipeline.has_error() {
        println!("{:?}", pipeline.get_errors_and_consume().unwrap()[0]);
    }
}
```
*/

pub use config::Config;
pub use config::args::CLIArgs;

pub mod config;
pub mod pipeline;
pub mod storage;
pub mod types;
