use std::io;
use std::io::Write;

use async_channel::Receiver;
use indicatif::{HumanBytes, HumanCount, HumanDuration, ProgressBar, ProgressStyle};
use s3mirror::types::SyncStatistics;
use simple_moving_average::{SMA, SumTreeSMA};
use tokio::task::JoinHandle;
use tokio::time::Instant;

const MOVING_AVERAGE_PERIOD_SECS: usize = 10;
const REFRESH_INTERVAL: f32 = 1.0;

pub fn show_indicator(
    stats_receiver: Receiver<SyncStatistics>,
    show_progress: bool,
    show_result: bool,
) -> JoinHandle<()> {
    let progress_style = ProgressStyle::with_template("{wide_msg}").unwrap();
    let progress_text = ProgressBar::new(0);
    progress_text.set_style(progress_style);

    tokio::spawn(async move {
        let start_time = Instant::now();

        let mut ma_copied_bytes = SumTreeSMA::<_, u64, MOVING_AVERAGE_PERIOD_SECS>::new();
        let mut ma_copied_count = SumTreeSMA::<_, u64, MOVING_AVERAGE_PERIOD_SECS>::new();

        let mut total_copy_count: u64 = 0;
        let mut total_copy_bytes: u64 = 0;
        let mut total_error_count: u64 = 0;
        let mut total_warning_count: u64 = 0;

        loop {
            let mut copy_bytes: u64 = 0;
            let mut copy_count: u64 = 0;

            let period = Instant::now();
            loop {
                while let Ok(copy_stats) = stats_receiver.try_recv() {
                    match copy_stats {
                        SyncStatistics::CopyComplete { .. } => {
                            copy_count += 1;
                            total_copy_count += 1;
                        }
                        SyncStatistics::CopyBytes(size) => {
                            copy_bytes += size;
                            total_copy_bytes += size
                        }
                        SyncStatistics::CopyError { .. } => {
                            total_error_count += 1;
                        }
                        SyncStatistics::CopyWarning { .. } => {
                            total_warning_count += 1;
                        }
                    }
                }

                if REFRESH_INTERVAL < period.elapsed().as_secs_f32() {
                    break;
                }

                if stats_receiver.is_closed() {
                    let elapsed = start_time.elapsed();
                    let elapsed_secs_f64 = elapsed.as_secs_f64();

                    let mut objects_per_sec = (total_copy_count as f64 / elapsed_secs_f64) as u64;
                    let mut copy_bytes_per_sec =
                        (total_copy_bytes as f64 / elapsed_secs_f64) as u64;

                    if elapsed_secs_f64 < REFRESH_INTERVAL as f64 {
                        objects_per_sec = total_copy_count;
                        copy_bytes_per_sec = total_copy_bytes;
                    }

                    if show_result {
                        progress_text.set_style(ProgressStyle::with_template("{msg}").unwrap());

                        progress_text.finish_with_message(format!(
                            "{:>3} | {:>3}/sec,  copied {:>3} objects | {:>3} objects/sec,  error {} objects,  warning {} objects,  duration {}",
                            HumanBytes(total_copy_bytes),
                            HumanBytes(copy_bytes_per_sec),
                            total_copy_count,
                            HumanCount(objects_per_sec),
                            total_error_count,
                            total_warning_count,
                            HumanDuration(elapsed),
                        ));

                        println!();
                        io::stdout().flush().unwrap()
                    }

                    return;
                }

                tokio::time::sleep(std::time::Duration::from_secs_f32(0.05)).await;
            }
            ma_copied_bytes.add_sample(copy_bytes);
            ma_copied_count.add_sample(copy_count);

            if show_progress {
                progress_text.set_message(format!(
                    "{:>3} | {:>3}/sec,  copied {:>3} objects | {:>3} objects/sec,  error {} objects,  warning {} objects",
                    HumanBytes(total_copy_bytes),
                    HumanBytes(ma_copied_bytes.get_average()).to_string(),
                    total_copy_count,
                    HumanCount(ma_copied_count.get_average()).to_string(),
                    total_error_count,
                    total_warning_count,
                ));
            }
        }
    })
}
