//! Analysis engine - runs the hypothesis battery, psychometrics and bootstrap

use super::bootstrap::{BootstrapReport, BootstrapValidator};
use super::hypotheses::{battery, Hypothesis};
use super::psychometrics;
use crate::config::Settings;
use crate::error::SurveyError;
use crate::{Dataset, HypothesisReport, StudyReport};
use chrono::Utc;
use tracing::{debug, info};

/// Main analysis engine that orchestrates all analyses
pub struct AnalysisEngine {
    settings: Settings,
    hypotheses: Vec<Box<dyn Hypothesis>>,
    /// Whether to include the psychometric analyses
    psychometrics: bool,
    /// Whether to run the bootstrap validator (still subject to settings)
    bootstrap: bool,
    /// Bootstrap result restored from the cache
    cached_bootstrap: Option<BootstrapReport>,
}

impl AnalysisEngine {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            hypotheses: battery(),
            psychometrics: true,
            bootstrap: true,
            cached_bootstrap: None,
        }
    }

    /// Skip factor analysis and correlation matrices
    pub fn without_psychometrics(mut self) -> Self {
        self.psychometrics = false;
        self
    }

    /// Skip the bootstrap validator regardless of settings
    pub fn without_bootstrap(mut self) -> Self {
        self.bootstrap = false;
        self
    }

    /// Reuse a bootstrap result instead of recomputing it
    pub fn with_cached_bootstrap(mut self, report: BootstrapReport) -> Self {
        self.cached_bootstrap = Some(report);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn run_hypothesis(
        &self,
        hypothesis: &dyn Hypothesis,
        dataset: &Dataset,
    ) -> Result<HypothesisReport, SurveyError> {
        let results = hypothesis.evaluate(dataset, &self.settings)?;
        debug!(
            hypothesis = hypothesis.id(),
            tests = results.len(),
            significant = results.iter().filter(|r| r.significant).count(),
            "hypothesis evaluated"
        );
        Ok(HypothesisReport {
            id: hypothesis.id().to_string(),
            description: hypothesis.description().to_string(),
            results,
            summaries: hypothesis.summaries(dataset, &self.settings),
        })
    }

    fn bootstrap(&self, dataset: &Dataset) -> Option<BootstrapReport> {
        if !self.bootstrap || !self.settings.bootstrap.enabled {
            return None;
        }
        if let Some(cached) = &self.cached_bootstrap {
            if cached.settings == self.settings.bootstrap {
                info!("using cached bootstrap result");
                return Some(cached.clone());
            }
        }
        Some(BootstrapValidator::new(&self.settings.bootstrap).run(dataset, &self.settings))
    }

    /// Analyze a harmonized dataset
    pub fn run(&self, dataset: &Dataset) -> Result<StudyReport, SurveyError> {
        let sample = dataset.summary();
        info!(total = sample.total, valid = sample.valid, "analyzing sample");

        let hypotheses = self
            .hypotheses
            .iter()
            .filter(|h| self.settings.hypothesis_enabled(h.id()))
            .map(|h| self.run_hypothesis(h.as_ref(), dataset))
            .collect::<Result<Vec<_>, _>>()?;

        let psychometrics = self
            .psychometrics
            .then(|| psychometrics::analyze(dataset, &self.settings));
        let bootstrap = self.bootstrap(dataset);

        Ok(StudyReport {
            generated_at: Utc::now(),
            sources: dataset.sources.clone(),
            alpha: self.settings.alpha,
            sample,
            hypotheses,
            psychometrics,
            bootstrap,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fixtures::{respondent, SINGLE_A, SLIDES_A};
    use crate::config::{Config, HypothesisSwitch};

    fn dataset() -> Dataset {
        let respondents = (0..10)
            .map(|i| respondent(i, if i % 2 == 0 { SINGLE_A } else { SLIDES_A }))
            .collect();
        Dataset {
            respondents,
            sources: Vec::new(),
        }
    }

    #[test]
    fn test_disabled_hypothesis_is_left_out() {
        let mut config = Config::default();
        config.hypotheses.insert("h2".to_string(), HypothesisSwitch::Off);
        let report = AnalysisEngine::new(config.settings())
            .without_psychometrics()
            .without_bootstrap()
            .run(&dataset())
            .unwrap();
        let ids: Vec<_> = report.hypotheses.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["H1", "H3", "H4"]);
        assert!(report.psychometrics.is_none());
        assert!(report.bootstrap.is_none());
    }

    #[test]
    fn test_bootstrap_runs_without_psychometrics() {
        let mut settings = Settings::default();
        settings.bootstrap.iterations = 2;
        let report = AnalysisEngine::new(settings.clone())
            .without_psychometrics()
            .run(&dataset())
            .unwrap();
        assert!(report.psychometrics.is_none());
        let bootstrap = report.bootstrap.expect("bootstrap kept");
        assert_eq!(bootstrap.settings, settings.bootstrap);
        assert_eq!(bootstrap.pairs.len(), 10);

        settings.bootstrap.enabled = false;
        let report = AnalysisEngine::new(settings).run(&dataset()).unwrap();
        assert!(report.bootstrap.is_none());
        assert!(report.psychometrics.is_some());
    }

    #[test]
    fn test_cached_bootstrap_is_reused() {
        let mut settings = Settings::default();
        settings.bootstrap.iterations = 3;
        let cached = BootstrapReport {
            settings: settings.bootstrap.clone(),
            pairs: Vec::new(),
            within_mean: Some(0.5),
            between_mean: Some(0.25),
        };
        let report = AnalysisEngine::new(settings)
            .with_cached_bootstrap(cached.clone())
            .run(&dataset())
            .unwrap();
        assert_eq!(report.bootstrap, Some(cached));
        assert_eq!(report.sample.total, 10);
    }
}
