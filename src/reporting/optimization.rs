//! Tabular progress output for optimization rounds

use crate::fingerprint::ConfigValue;
use crate::model::Hyperparameters;
use std::fmt::Write as _;
use std::time::Instant;

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const MAGENTA: &str = "\x1b[35m";
const STOP: &str = "\x1b[0m";
const END: &str = " | ";

/// Which header to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    /// Results read from prior experiments
    SavedResults,
    /// Random initial points
    RandomPoints,
    /// Surrogate-guided rounds
    Optimization,
}

impl HeaderKind {
    const fn title(self) -> &'static str {
        match self {
            Self::SavedResults => "Saved Result Files",
            Self::RandomPoints => "Random Point Evaluation",
            Self::Optimization => "Hyperparameter Optimization",
        }
    }
}

/// Experiment id column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShowExperimentId {
    /// Full id
    #[default]
    Full,
    /// First eight characters
    Partial,
    /// No id column
    Hidden,
}

impl ShowExperimentId {
    const fn width(self) -> Option<usize> {
        match self {
            Self::Full => Some(36),
            Self::Partial => Some(8),
            Self::Hidden => None,
        }
    }
}

/// Prints one row per evaluated point, highlighting each new best.
#[derive(Debug)]
pub struct OptimizationReporter {
    parameter_names: Vec<String>,
    sizes: Vec<usize>,
    verbose: bool,
    show_experiment_id: ShowExperimentId,
    greater_is_better: bool,
    color: bool,
    best: Option<f64>,
    iteration: usize,
    last_round: Instant,
}

impl OptimizationReporter {
    /// Reporter for the given hyperparameter names (shown in sorted order).
    #[must_use]
    pub fn new<S: AsRef<str>>(parameter_names: &[S], verbose: bool) -> Self {
        let mut names: Vec<String> = parameter_names.iter().map(|s| s.as_ref().to_string()).collect();
        names.sort();
        let sizes = names.iter().map(|n| n.len().max(7)).collect();
        Self {
            parameter_names: names,
            sizes,
            verbose,
            show_experiment_id: ShowExperimentId::default(),
            greater_is_better: true,
            color: true,
            best: None,
            iteration: 0,
            last_round: Instant::now(),
        }
    }

    /// Configure the experiment id column.
    #[must_use]
    pub const fn show_experiment_id(mut self, show: ShowExperimentId) -> Self {
        self.show_experiment_id = show;
        self
    }

    /// Direction used to detect a new best.
    #[must_use]
    pub const fn greater_is_better(mut self, greater_is_better: bool) -> Self {
        self.greater_is_better = greater_is_better;
        self
    }

    /// Enable or disable ANSI colors.
    #[must_use]
    pub const fn color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Best value reported so far.
    #[must_use]
    pub const fn best(&self) -> Option<f64> {
        self.best
    }

    fn paint(&self, pre: &str, text: &str) -> String {
        if self.color {
            format!("{pre}{text}{STOP}")
        } else {
            text.to_string()
        }
    }

    /// Render a header: title, rule, and column names.
    #[must_use]
    pub fn header(&self, kind: HeaderKind) -> String {
        let id_width = self.show_experiment_id.width().map_or(0, |w| w + END.len());
        let rule_len = 29 + id_width + self.sizes.iter().map(|s| s + 5).sum::<usize>();

        let mut out = String::new();
        let _ = writeln!(out, "{}", self.paint(RED, kind.title()));
        let _ = writeln!(out, "{}", self.paint(RED, &"_".repeat(rule_len)));
        let _ = write!(out, "{:>5}{END}{:>6}{END}", "Step", "Time");
        if let Some(width) = self.show_experiment_id.width() {
            let _ = write!(out, "{:>width$}{END}", "ID");
        }
        let _ = write!(out, "{:>10}{END}", "Value");
        for (name, size) in self.parameter_names.iter().zip(&self.sizes) {
            let _ = write!(out, "{name:>w$}{END}", w = size + 2);
        }
        out
    }

    /// Render the row for one evaluated point and advance the step counter.
    pub fn result_row(
        &mut self,
        experiment_id: &str,
        hyperparameters: &Hyperparameters,
        evaluation: f64,
    ) -> String {
        let elapsed = self.last_round.elapsed().as_secs();
        let mut out = format!(
            "{:>5}{END}{:02}m{:02}s{END}",
            self.iteration,
            elapsed / 60,
            elapsed % 60
        );
        if let Some(width) = self.show_experiment_id.width() {
            let shown: String = experiment_id.chars().take(width).collect();
            let _ = write!(out, "{shown:>width$}{END}");
        }

        let is_best = self.best.map_or(true, |best| {
            if self.greater_is_better {
                evaluation > best
            } else {
                evaluation < best
            }
        });
        let value = format!("{evaluation:>10.5}");
        let params: Vec<String> = self
            .parameter_names
            .iter()
            .zip(&self.sizes)
            .map(|(name, size)| format_param(hyperparameters.get(name), *size))
            .collect();

        if is_best {
            self.best = Some(evaluation);
            let _ = write!(out, "{}{END}", self.paint(MAGENTA, &value));
            for param in &params {
                let _ = write!(out, "{}{END}", self.paint(GREEN, param));
            }
        } else {
            let _ = write!(out, "{value}{END}");
            for param in &params {
                let _ = write!(out, "{param}{END}");
            }
        }

        self.iteration += 1;
        self.last_round = Instant::now();
        out
    }

    /// Print a header when verbose.
    pub fn print_header(&self, kind: HeaderKind) {
        if self.verbose {
            println!("{}", self.header(kind));
        }
    }

    /// Print a result row when verbose (the step counter advances regardless).
    pub fn print_result(&mut self, experiment_id: &str, hyperparameters: &Hyperparameters, evaluation: f64) {
        let row = self.result_row(experiment_id, hyperparameters, evaluation);
        if self.verbose {
            println!("{row}");
        }
    }
}

fn format_param(value: Option<&ConfigValue>, size: usize) -> String {
    let width = size + 2;
    match value {
        Some(ConfigValue::Float(v)) => {
            let precision = size.saturating_sub(3).min(4);
            format!("{v:>width$.precision$}")
        }
        Some(other) => format!("{:>width$}", other.to_string()),
        None => format!("{:>width$}", "-"),
    }
}
