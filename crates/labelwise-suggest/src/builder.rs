//! Build class prototypes and boundary corrections from confirmed labels.

use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use labelwise_cluster::Prototype;
use labelwise_dtw::Sequence;
use labelwise_io::{ClassName, Label, ResampleWindow};
use labelwise_spring::{BestMatchMatcher, SpringReference};

use crate::config::{length_window, BuilderConfig};
use crate::error::SuggestError;
use crate::model::{ReferenceLabel, SuggestionModel};

/// Output of [`ReferenceBuilder::build`].
#[derive(Debug, Clone)]
pub struct BuiltReferences {
    /// Samples per second every reference is expressed at.
    pub sample_rate: f64,
    /// One entry per prototype, grouped by class in first-appearance order.
    pub references: Vec<ReferenceLabel>,
    /// Exemplars dropped because they resampled to fewer than 2 samples.
    pub skipped_exemplars: usize,
}

impl BuiltReferences {
    /// Wrap the references into a [`SuggestionModel`].
    #[must_use]
    pub fn into_model(self) -> SuggestionModel {
        SuggestionModel::new(self.sample_rate, self.references)
    }
}

/// Turns labelled spans of a dataset into [`ReferenceLabel`]s.
///
/// The longest label fixes the sample rate. Each class is clustered into
/// prototypes with DTW k-means, then every exemplar is re-matched against
/// its class prototypes inside a widened window to learn how far labels
/// tend to sit from where the prototype actually matches.
#[derive(Debug, Clone)]
pub struct ReferenceBuilder {
    config: BuilderConfig,
}

struct Exemplar<'a> {
    label: &'a Label,
    series: Sequence,
}

impl ReferenceBuilder {
    /// Create a builder.
    ///
    /// # Errors
    ///
    /// See [`BuilderConfig::validate`].
    pub fn new(config: BuilderConfig) -> Result<Self, SuggestError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Build references for every class in `labels`.
    ///
    /// Classes are processed in parallel. No labels yields an empty set at
    /// a sample rate of 1.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SuggestError::InvalidLabel`] | A label has non-finite bounds or `end <= start` |
    /// | [`SuggestError::Io`] | The dataset cannot resample a window |
    /// | [`SuggestError::Cluster`] | Prototype clustering fails |
    /// | [`SuggestError::Spring`] | Calibration matching fails |
    #[instrument(skip_all, fields(n_labels = labels.len()))]
    pub fn build<D>(&self, dataset: &D, labels: &[Label]) -> Result<BuiltReferences, SuggestError>
    where
        D: ResampleWindow + Sync,
    {
        for (index, label) in labels.iter().enumerate() {
            let (start, end) = (label.timestamp_start, label.timestamp_end);
            if !start.is_finite() || !end.is_finite() || end <= start {
                return Err(SuggestError::InvalidLabel { index, start, end });
            }
        }

        let Some(max_duration) = labels.iter().map(Label::duration).max_by(f64::total_cmp) else {
            info!("no labels, empty reference set");
            return Ok(BuiltReferences {
                sample_rate: 1.0,
                references: Vec::new(),
                skipped_exemplars: 0,
            });
        };
        let sample_rate = self.config.samples_per_longest_label as f64 / max_duration;
        debug!(sample_rate, max_duration, "sample rate fixed");

        let classes = group_by_class(labels);
        let per_class: Vec<(Vec<ReferenceLabel>, usize)> = classes
            .par_iter()
            .map(|(class, members)| self.build_class(dataset, class, members, sample_rate))
            .collect::<Result<_, _>>()?;

        let skipped_exemplars: usize = per_class.iter().map(|(_, skipped)| skipped).sum();
        let references: Vec<ReferenceLabel> =
            per_class.into_iter().flat_map(|(refs, _)| refs).collect();

        info!(
            n_classes = classes.len(),
            n_references = references.len(),
            skipped_exemplars,
            sample_rate,
            "references built"
        );
        Ok(BuiltReferences {
            sample_rate,
            references,
            skipped_exemplars,
        })
    }

    #[instrument(skip_all, fields(class = %class, n_members = members.len()))]
    fn build_class<D: ResampleWindow>(
        &self,
        dataset: &D,
        class: &ClassName,
        members: &[&Label],
        sample_rate: f64,
    ) -> Result<(Vec<ReferenceLabel>, usize), SuggestError> {
        let mut exemplars = Vec::with_capacity(members.len());
        let mut skipped = 0;
        for &label in members {
            let count = (sample_rate * label.duration()).round() as usize;
            if count < 2 {
                warn!(
                    start = label.timestamp_start,
                    end = label.timestamp_end,
                    count,
                    "exemplar too short to resample, skipped"
                );
                skipped += 1;
                continue;
            }
            let series = dataset.resample_window(label.timestamp_start, label.timestamp_end, count)?;
            exemplars.push(Exemplar { label, series });
        }
        if exemplars.is_empty() {
            warn!("class has no usable exemplars");
            return Ok((Vec::new(), skipped));
        }

        let k = self.config.prototypes_per_class.min(exemplars.len());
        let series: Vec<Sequence> = exemplars.iter().map(|e| e.series.clone()).collect();
        let result = self.config.kmeans(k)?.fit(&series)?;
        debug!(k, iterations = result.iterations, converged = result.converged, "class clustered");

        let (adjustments_begin, adjustments_end, accepted) =
            self.calibrate(dataset, &exemplars, &result.prototypes, sample_rate)?;
        debug!(
            adjustments_begin,
            adjustments_end,
            accepted,
            total = exemplars.len(),
            "boundaries calibrated"
        );

        let references = result
            .prototypes
            .into_iter()
            .map(|p| ReferenceLabel {
                class_name: class.clone(),
                series: p.mean,
                variance: p.variance,
                adjustments_begin,
                adjustments_end,
            })
            .collect();
        Ok((references, skipped))
    }

    /// Mean offset (matched minus labelled) of both boundaries over the
    /// exemplars whose best match lands within the margin of both.
    ///
    /// A match only counts when its cost is within the matched prototype's
    /// variance. Prototypes without a variance take no part.
    fn calibrate<D: ResampleWindow>(
        &self,
        dataset: &D,
        exemplars: &[Exemplar<'_>],
        prototypes: &[Prototype],
        sample_rate: f64,
    ) -> Result<(f64, f64, usize), SuggestError> {
        let references = prototypes
            .iter()
            .filter_map(|p| Some((&p.mean, p.variance?)))
            .map(|(mean, variance)| {
                let (min_len, max_len) = length_window(mean.len(), self.config.duration_tolerance);
                SpringReference::with_length_bounds(mean.clone(), variance, min_len, max_len)
            })
            .collect::<Result<Vec<_>, _>>()?;
        if references.is_empty() {
            return Ok((0.0, 0.0, 0));
        }

        let mut sum_begin = 0.0;
        let mut sum_end = 0.0;
        let mut accepted = 0;

        for exemplar in exemplars {
            let label = exemplar.label;
            let duration = label.duration();
            let margin = self.config.calibration_margin * duration;
            let window_start = label.timestamp_start - margin;
            let window_end = label.timestamp_end + margin;
            let count = (sample_rate * (duration + 2.0 * margin)).round() as usize;
            if count == 0 {
                continue;
            }
            let window = dataset.resample_window(window_start, window_end, count)?;

            let mut matcher = BestMatchMatcher::new(references.clone())?;
            matcher.feed_all(window.samples())?;

            let Some(best) = matcher.best_match() else {
                continue;
            };
            let step = (window_end - window_start) / count as f64;
            let matched_start = window_start + best.start_index as f64 * step;
            let matched_end = window_start + (best.end_index + 1) as f64 * step;
            let offset_begin = matched_start - label.timestamp_start;
            let offset_end = matched_end - label.timestamp_end;
            if offset_begin.abs() < margin && offset_end.abs() < margin {
                sum_begin += offset_begin;
                sum_end += offset_end;
                accepted += 1;
            }
        }

        if accepted == 0 {
            return Ok((0.0, 0.0, 0));
        }
        Ok((sum_begin / accepted as f64, sum_end / accepted as f64, accepted))
    }
}

/// Group labels by class, keeping first-appearance order of classes.
fn group_by_class(labels: &[Label]) -> Vec<(ClassName, Vec<&Label>)> {
    let mut groups: Vec<(ClassName, Vec<&Label>)> = Vec::new();
    for label in labels {
        match groups.iter_mut().find(|(class, _)| *class == label.class_name) {
            Some((_, members)) => members.push(label),
            None => groups.push((label.class_name.clone(), vec![label])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use labelwise_dtw::Dtw;
    use labelwise_io::SensorDataset;

    use super::*;

    /// Strictly increasing first channel so every window is unique.
    fn recording() -> SensorDataset {
        let timestamps: Vec<f64> = (0..=400).map(|i| i as f64 * 0.05).collect();
        let rows = timestamps
            .iter()
            .map(|&t| vec![t + 0.3 * (3.0 * t).sin(), (2.0 * t).cos()])
            .collect();
        SensorDataset::new(timestamps, rows).unwrap()
    }

    fn builder() -> ReferenceBuilder {
        ReferenceBuilder::new(BuilderConfig::default()).unwrap()
    }

    #[test]
    fn no_labels_gives_empty_set() {
        let built = builder().build(&recording(), &[]).unwrap();
        assert!(built.references.is_empty());
        assert_eq!(built.sample_rate, 1.0);
    }

    #[test]
    fn inverted_label_rejected() {
        let labels = vec![Label::new("wave", 1.0, 2.0), Label::new("wave", 3.0, 3.0)];
        assert!(matches!(
            builder().build(&recording(), &labels),
            Err(SuggestError::InvalidLabel { index: 1, .. })
        ));
    }

    #[test]
    fn single_exemplar_is_its_own_prototype() {
        let ds = recording();
        let labels = vec![Label::new("wave", 5.0, 7.0)];
        let built = builder().build(&ds, &labels).unwrap();

        assert!((built.sample_rate - 50.0).abs() < 1e-12);
        assert_eq!(built.references.len(), 1);
        let reference = &built.references[0];
        assert_eq!(reference.variance, Some(0.0));
        let exemplar = ds.resample_window(5.0, 7.0, 100).unwrap();
        assert_eq!(reference.series, exemplar);
        // The exemplar matches itself in place.
        assert!(reference.adjustments_begin.abs() < 1e-9);
        assert!(reference.adjustments_end.abs() < 1e-9);
    }

    #[test]
    fn classes_keep_first_appearance_order() {
        let labels = vec![
            Label::new("b", 1.0, 2.0),
            Label::new("a", 3.0, 4.0),
            Label::new("b", 5.0, 6.0),
        ];
        let built = builder().build(&recording(), &labels).unwrap();
        let names: Vec<&str> = built.references.iter().map(|r| r.class_name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert!(built.references[0].variance.unwrap() > 0.0);
    }

    #[test]
    fn short_exemplars_are_skipped() {
        // Rate is 100 / 10 s = 10 Hz; 0.1 s resamples to a single sample.
        let labels = vec![Label::new("long", 2.0, 12.0), Label::new("blip", 15.0, 15.1)];
        let built = builder().build(&recording(), &labels).unwrap();
        assert_eq!(built.skipped_exemplars, 1);
        assert_eq!(built.references.len(), 1);
        assert_eq!(built.references[0].class_name.as_str(), "long");
    }

    #[test]
    fn calibration_recovers_label_shift() {
        let ds = recording();
        let b = builder();
        let rate = 50.0;
        // The prototype is the true gesture at [5, 7]; the label sits 0.1 s early.
        let prototype = ds.resample_window(5.0, 7.0, 100).unwrap();
        let label = Label::new("wave", 4.9, 6.9);
        let exemplars = vec![Exemplar {
            label: &label,
            series: ds.resample_window(4.9, 6.9, 100).unwrap(),
        }];

        let prototype = Prototype {
            mean: prototype,
            variance: Some(1.0),
        };
        let (begin, end, accepted) = b.calibrate(&ds, &exemplars, &[prototype], rate).unwrap();
        assert_eq!(accepted, 1);
        assert!((begin - 0.1).abs() < 1e-9, "begin offset {begin}");
        assert!((end - 0.1).abs() < 1e-9, "end offset {end}");
    }

    /// Gaussian bumps at 5 s, 15 s and 25 s; the middle one is taller.
    fn bump_recording() -> SensorDataset {
        let timestamps: Vec<f64> = (0..=300).map(|i| i as f64 * 0.1).collect();
        let rows = timestamps
            .iter()
            .map(|&t| {
                let bump = |center: f64, height: f64| height * (-((t - center) / 0.3).powi(2)).exp();
                vec![bump(5.0, 1.0) + bump(15.0, 1.5) + bump(25.0, 1.0)]
            })
            .collect();
        SensorDataset::new(timestamps, rows).unwrap()
    }

    #[test]
    fn calibration_ignores_matches_above_variance() {
        let ds = bump_recording();
        let b = builder();
        let rate = 50.0;
        let labels = [
            Label::new("bump", 4.0, 6.0),
            Label::new("bump", 14.0, 16.0),
            Label::new("bump", 24.0, 26.0),
        ];
        let exemplars: Vec<Exemplar<'_>> = labels
            .iter()
            .map(|label| Exemplar {
                label,
                series: ds.resample_window(label.timestamp_start, label.timestamp_end, 100).unwrap(),
            })
            .collect();
        let mean = ds.resample_window(4.0, 6.0, 100).unwrap();

        // The taller bump costs far more than 1.0 against the short prototype.
        let tall = Dtw::manhattan().distance(exemplars[1].series.as_view(), mean.as_view()).value();
        assert!(tall > 1.0, "tall bump cost {tall}");

        let prototype = Prototype {
            mean: mean.clone(),
            variance: Some(1.0),
        };
        let (begin, end, accepted) = b.calibrate(&ds, &exemplars, &[prototype], rate).unwrap();
        assert_eq!(accepted, 2);
        assert!(begin.abs() < 0.1 && end.abs() < 0.1);

        let unlimited = Prototype {
            mean,
            variance: Some(f64::INFINITY),
        };
        let (_, _, accepted) = b.calibrate(&ds, &exemplars, &[unlimited], rate).unwrap();
        assert_eq!(accepted, 3);
    }

    #[test]
    fn calibration_skips_prototypes_without_variance() {
        let ds = bump_recording();
        let label = Label::new("bump", 4.0, 6.0);
        let mean = ds.resample_window(4.0, 6.0, 100).unwrap();
        let exemplars = vec![Exemplar {
            label: &label,
            series: mean.clone(),
        }];
        let prototype = Prototype { mean, variance: None };
        let calibrated = builder().calibrate(&ds, &exemplars, &[prototype], 50.0).unwrap();
        assert_eq!(calibrated, (0.0, 0.0, 0));
    }
}
