use crate::config::LOG_PATH;
use burn::tensor::cast::ToElement;
use burn::tensor::{Tensor, backend::Backend};
use chrono::Utc;
use std::fs::File;
use std::io::Write;
use std::time::Instant;

/// Running loss / throughput tracker for one pass over a split. Prints a
/// carriage-return progress line to the console and appends the final line of
/// each pass to the log file.
pub struct Stats {
    stopwatch: Instant,
    batch_size: usize,
    loss_sum: f32,
    iterations: usize,
    log_output: String,
    f_handle: File,
}

impl Stats {
    pub fn new(batch_size: usize) -> Self {
        if let Some(parent) = std::path::Path::new(LOG_PATH).parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let f_handle = File::options()
            .create(true)
            .append(true)
            .open(LOG_PATH)
            .unwrap();
        let now = Utc::now();

        writeln!(&f_handle, "\n----{}----\n", now.format("%Y-%m-%d %H:%M:%S")).unwrap();
        Stats {
            stopwatch: Instant::now(),
            batch_size,
            loss_sum: 0.0,
            iterations: 0,
            log_output: String::new(),
            f_handle,
        }
    }

    /// Folds one batch's loss into the running mean. `iteration` is the
    /// zero-based dataloader index; the first batch counts like any other,
    /// so a single-batch pass still reports its own mean loss.
    pub fn update<B: Backend>(
        &mut self,
        loss: Tensor<B, 2>,
        iteration: usize,
        name: String,
        epoch: usize,
    ) {
        self.loss_sum += loss.clone().sum().into_scalar().to_f32();
        self.iterations = iteration + 1;

        let elapsed = self.stopwatch.elapsed().as_secs();

        self.log_output = format!(
            "{},E:{:<6.3},I:{:<6.3},L:{:<6.3},T:{:<}m{:<}s\r",
            name,
            epoch,
            self.iterations * self.batch_size,
            self.loss_sum / self.iterations as f32,
            (elapsed / 60),
            elapsed % 60
        );

        print!("{}", &self.log_output);
        std::io::stdout().flush().unwrap();
    }

    /// Mean loss per iteration accumulated since the last flush.
    pub fn avg(&self) -> f32 {
        if self.iterations == 0 {
            return 0.0;
        }
        self.loss_sum / self.iterations as f32
    }

    pub fn flush(&mut self) {
        writeln!(self.f_handle, "{}", self.log_output).unwrap();
        self.stopwatch = Instant::now();
        self.loss_sum = 0.0;
        self.iterations = 0;
        println!();
    }
}
