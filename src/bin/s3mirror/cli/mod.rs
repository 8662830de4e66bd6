use anyhow::{Result, anyhow};
use tokio::time::Instant;
use tracing::{error, trace};

use s3mirror::Config;
use s3mirror::pipeline::Pipeline;
use s3mirror::types::SyncResult;
use s3mirror::types::token::create_pipeline_cancellation_token;

mod ctrl_c_handler;
mod indicator;
mod ui_config;

const EXIT_CODE_SUCCESS: i32 = 0;
const EXIT_CODE_ERROR: i32 = 1;
#[allow(dead_code)]
const EXIT_CODE_INVALID_ARGS: i32 = 2;

pub async fn run(config: Config) -> Result<()> {
    let cancellation_token = create_pipeline_cancellation_token();

    ctrl_c_handler::spawn_ctrl_c_handler(cancellation_token.clone());

    let start_time = Instant::now();
    trace!("copy pipeline start.");

    let mut pipeline = Pipeline::new(config.clone(), cancellation_token).await;
    let indicator_join_handle = indicator::show_indicator(
        pipeline.get_stats_receiver(),
        ui_config::is_progress_indicator_needed(&config),
        ui_config::is_show_result_needed(&config),
    );

    let result = pipeline.run().await;
    indicator_join_handle.await?;

    let duration_sec = format!("{:.3}", start_time.elapsed().as_secs_f32());
    if pipeline.has_error() {
        error!(duration_sec = duration_sec, "s3mirror failed.");

        return Err(anyhow!("s3mirror failed."));
    }

    report_failures(&result);

    trace!(duration_sec = duration_sec, "s3mirror has been completed.");

    let exit_code = exit_code_for(&result);
    if exit_code != EXIT_CODE_SUCCESS {
        std::process::exit(exit_code);
    }

    Ok(())
}

fn report_failures(result: &SyncResult) {
    for failure in &result.failures {
        eprintln!(
            "failed to copy '{}' after {} attempts: {}",
            failure.key, failure.attempts, failure.error
        );
    }
}

fn exit_code_for(result: &SyncResult) -> i32 {
    if result.failed > 0 {
        EXIT_CODE_ERROR
    } else {
        EXIT_CODE_SUCCESS
    }
}
