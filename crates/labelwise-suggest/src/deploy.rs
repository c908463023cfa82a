//! Source code generation for running a model on a microcontroller.

use std::fmt::Write as _;
use std::str::FromStr;

use tracing::{info, instrument};

use crate::config::length_window;
use crate::error::SuggestError;
use crate::likelihood::distance_threshold;
use crate::model::{ReferenceLabel, SuggestionModel};

/// Confidence the generated thresholds are computed for.
const DEPLOY_CONFIDENCE: f64 = 0.5;

/// Samples a pending match may wait before it is reported anyway.
const HISTORY_SAMPLES: usize = 30;

/// Target of [`SuggestionModel::deployment_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Arduino sketch in C++.
    Arduino,
    /// BBC micro:bit MakeCode program in TypeScript.
    Microbit,
}

impl FromStr for Platform {
    type Err = SuggestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "arduino" => Ok(Self::Arduino),
            "microbit" => Ok(Self::Microbit),
            other => Err(SuggestError::UnsupportedPlatform {
                platform: other.to_string(),
            }),
        }
    }
}

/// What the generators need per enabled reference.
struct Embedded<'a> {
    reference: &'a ReferenceLabel,
    threshold: f64,
    min_len: usize,
    max_len: usize,
}

impl SuggestionModel {
    /// Generate a standalone streaming matcher for `platform`
    /// (`"arduino"` or `"microbit"`) with every enabled reference embedded.
    ///
    /// # Errors
    ///
    /// Returns [`SuggestError::UnsupportedPlatform`] for any other name.
    #[instrument(skip(self))]
    pub fn deployment_code(&self, platform: &str) -> Result<String, SuggestError> {
        let platform: Platform = platform.parse()?;
        let embedded: Vec<Embedded<'_>> = self
            .active_references()
            .filter_map(|reference| {
                let variance = reference.variance?;
                let (min_len, max_len) = length_window(reference.series.len(), (0.8, 1.2));
                Some(Embedded {
                    reference,
                    threshold: distance_threshold(DEPLOY_CONFIDENCE, variance),
                    min_len,
                    max_len,
                })
            })
            .collect();
        let dim = self.dimension().unwrap_or(1);

        let code = match platform {
            Platform::Arduino => arduino(self.sample_rate(), dim, &embedded),
            Platform::Microbit => microbit(self.sample_rate(), dim, &embedded),
        };
        info!(?platform, n_references = embedded.len(), size_bytes = code.len(), "deployment code generated");
        Ok(code)
    }
}

fn c_float(v: f64) -> String {
    if v.is_nan() { "NAN".to_string() } else { format!("{v:?}") }
}

fn ts_number(v: f64) -> String {
    if v.is_nan() { "NaN".to_string() } else { format!("{v:?}") }
}

fn join<T>(items: impl IntoIterator<Item = T>, f: impl Fn(T) -> String) -> String {
    items.into_iter().map(f).collect::<Vec<_>>().join(", ")
}

// ── Arduino ──

fn arduino(sample_rate: f64, dim: usize, refs: &[Embedded<'_>]) -> String {
    let n = refs.len();
    let max_len = refs.iter().map(|e| e.reference.series.len()).max().unwrap_or(1);
    let mut out = String::new();

    let _ = writeln!(out, "// Streaming DTW gesture matcher generated by labelwise.");
    let _ = writeln!(out, "#include <math.h>\n");
    let _ = writeln!(out, "const float SAMPLE_RATE = {};", c_float(sample_rate));
    let _ = writeln!(out, "const int HISTORY = {HISTORY_SAMPLES};");
    let _ = writeln!(out, "const int DIM = {dim};");
    let _ = writeln!(out, "const int N_REFS = {};", n.max(1));
    let _ = writeln!(out, "const int MAX_LEN = {max_len};\n");

    for (r, e) in refs.iter().enumerate() {
        let rows = join(e.reference.series.samples(), |s| format!("{{{}}}", join(s.iter(), |&v| c_float(v))));
        let _ = writeln!(out, "const float REF_{r}[{}][DIM] = {{{rows}}};", e.reference.series.len());
    }
    if refs.is_empty() {
        let _ = writeln!(out, "const float REF_0[1][DIM] = {{{{0}}}};");
    }
    let _ = writeln!(
        out,
        "const float* REF_DATA[N_REFS] = {{{}}};",
        join(0..n.max(1), |r| format!("&REF_{r}[0][0]"))
    );
    let _ = writeln!(
        out,
        "const char* REF_NAMES[N_REFS] = {{{}}};",
        if refs.is_empty() { "\"\"".to_string() } else { join(refs, |e| format!("{:?}", e.reference.class_name.as_str())) }
    );
    let _ = writeln!(out, "const int REF_LENS[N_REFS] = {{{}}};", list_or_zero(refs, |e| e.reference.series.len().to_string()));
    let _ = writeln!(out, "const float REF_THRESHOLDS[N_REFS] = {{{}}};", list_or_zero(refs, |e| c_float(e.threshold)));
    let _ = writeln!(out, "const int REF_MIN_LEN[N_REFS] = {{{}}};", list_or_zero(refs, |e| e.min_len.to_string()));
    let _ = writeln!(out, "const int REF_MAX_LEN[N_REFS] = {{{}}};", list_or_zero(refs, |e| e.max_len.to_string()));
    let _ = writeln!(out, "const int ACTIVE_REFS = {n};");

    out.push_str(ARDUINO_BODY);
    out
}

fn list_or_zero(refs: &[Embedded<'_>], f: impl Fn(&Embedded<'_>) -> String) -> String {
    if refs.is_empty() { "0".to_string() } else { join(refs, f) }
}

const ARDUINO_BODY: &str = r#"
float costs[N_REFS][MAX_LEN + 1];
long starts[N_REFS][MAX_LEN + 1];
float prevCosts[N_REFS][MAX_LEN + 1];
long prevStarts[N_REFS][MAX_LEN + 1];
float dMin[N_REFS];
long tS[N_REFS];
long tE[N_REFS];
long t = 0;

// L1 distance; missing values are skipped.
float sampleDistance(const float* a, const float* b) {
  float s = 0;
  for (int k = 0; k < DIM; k++) {
    float d = fabs(a[k] - b[k]);
    if (!isnan(d)) s += d;
  }
  return s;
}

void resetMatcher() {
  for (int r = 0; r < N_REFS; r++) {
    for (int i = 0; i <= MAX_LEN; i++) {
      costs[r][i] = INFINITY;
      starts[r][i] = 0;
    }
    dMin[r] = INFINITY;
  }
  t = 0;
}

// Feed one sample. Returns the reference that matched, or -1.
int feedSample(const float* x) {
  int fired = -1;
  float firedDist = INFINITY;
  for (int r = 0; r < ACTIVE_REFS; r++) {
    const int m = REF_LENS[r];
    const float* ref = REF_DATA[r];
    for (int i = 0; i <= m; i++) {
      prevCosts[r][i] = costs[r][i];
      prevStarts[r][i] = starts[r][i];
    }
    costs[r][0] = 0;
    starts[r][0] = t;
    for (int i = 1; i <= m; i++) {
      float best = i == 1 ? 0 : prevCosts[r][i - 1];
      long start = i == 1 ? t : prevStarts[r][i - 1];
      if (costs[r][i - 1] < best) { best = costs[r][i - 1]; start = starts[r][i - 1]; }
      if (prevCosts[r][i] < best) { best = prevCosts[r][i]; start = prevStarts[r][i]; }
      costs[r][i] = sampleDistance(x, ref + (i - 1) * DIM) + best;
      starts[r][i] = start;
    }

    if (dMin[r] < INFINITY) {
      bool done = t - tE[r] >= HISTORY;
      if (!done) {
        done = true;
        for (int i = 1; i <= m; i++) {
          if (costs[r][i] < dMin[r] && starts[r][i] <= tE[r]) { done = false; break; }
        }
      }
      if (done) {
        if (dMin[r] < firedDist) { fired = r; firedDist = dMin[r]; }
        for (int i = 1; i <= m; i++) {
          if (starts[r][i] <= tE[r]) costs[r][i] = INFINITY;
        }
        dMin[r] = INFINITY;
      }
    }

    long len = t - starts[r][m] + 1;
    if (costs[r][m] <= REF_THRESHOLDS[r] && costs[r][m] < dMin[r] && len >= REF_MIN_LEN[r] && len <= REF_MAX_LEN[r]) {
      dMin[r] = costs[r][m];
      tS[r] = starts[r][m];
      tE[r] = t;
    }
  }
  t++;
  return fired;
}

// Replace with the sensors the model was trained on.
void readSample(float* x) {
  for (int k = 0; k < DIM; k++) x[k] = analogRead(A0 + k);
}

void setup() {
  Serial.begin(115200);
  resetMatcher();
}

void loop() {
  static unsigned long next = 0;
  unsigned long now = millis();
  if (now < next) return;
  next = now + (unsigned long)(1000.0 / SAMPLE_RATE);

  float x[DIM];
  readSample(x);
  int r = feedSample(x);
  if (r >= 0) {
    Serial.print("match: ");
    Serial.println(REF_NAMES[r]);
  }
}
"#;

// ── micro:bit ──

fn microbit(sample_rate: f64, dim: usize, refs: &[Embedded<'_>]) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "// Streaming DTW gesture matcher generated by labelwise.");
    let _ = writeln!(out, "const SAMPLE_RATE = {};", ts_number(sample_rate));
    let _ = writeln!(out, "const HISTORY = {HISTORY_SAMPLES};");
    let _ = writeln!(out, "const DIM = {dim};");
    let _ = writeln!(
        out,
        "const REFS: number[][][] = [{}];",
        join(refs, |e| format!(
            "[{}]",
            join(e.reference.series.samples(), |s| format!("[{}]", join(s.iter(), |&v| ts_number(v))))
        ))
    );
    let _ = writeln!(out, "const REF_NAMES = [{}];", join(refs, |e| format!("{:?}", e.reference.class_name.as_str())));
    let _ = writeln!(out, "const REF_THRESHOLDS = [{}];", join(refs, |e| ts_number(e.threshold)));
    let _ = writeln!(out, "const REF_MIN_LEN = [{}];", join(refs, |e| e.min_len.to_string()));
    let _ = writeln!(out, "const REF_MAX_LEN = [{}];", join(refs, |e| e.max_len.to_string()));

    out.push_str(MICROBIT_BODY);
    out
}

const MICROBIT_BODY: &str = r#"
let costs: number[][] = REFS.map(ref => ref.map(() => Infinity).concat([Infinity]));
let starts: number[][] = REFS.map(ref => ref.map(() => 0).concat([0]));
let dMin: number[] = REFS.map(() => Infinity);
let tE: number[] = REFS.map(() => 0);
let t = 0;

// L1 distance; missing values are skipped.
function sampleDistance(a: number[], b: number[]): number {
    let s = 0;
    for (let k = 0; k < DIM; k++) {
        const d = Math.abs(a[k] - b[k]);
        if (!isNaN(d)) s += d;
    }
    return s;
}

// Feed one sample. Returns the reference that matched, or -1.
function feedSample(x: number[]): number {
    let fired = -1;
    let firedDist = Infinity;
    for (let r = 0; r < REFS.length; r++) {
        const ref = REFS[r];
        const m = ref.length;
        const prevCosts = costs[r].slice();
        const prevStarts = starts[r].slice();
        costs[r][0] = 0;
        starts[r][0] = t;
        for (let i = 1; i <= m; i++) {
            let best = i == 1 ? 0 : prevCosts[i - 1];
            let start = i == 1 ? t : prevStarts[i - 1];
            if (costs[r][i - 1] < best) { best = costs[r][i - 1]; start = starts[r][i - 1]; }
            if (prevCosts[i] < best) { best = prevCosts[i]; start = prevStarts[i]; }
            costs[r][i] = sampleDistance(x, ref[i - 1]) + best;
            starts[r][i] = start;
        }

        if (dMin[r] < Infinity) {
            let done = t - tE[r] >= HISTORY;
            if (!done) {
                done = true;
                for (let i = 1; i <= m; i++) {
                    if (costs[r][i] < dMin[r] && starts[r][i] <= tE[r]) { done = false; break; }
                }
            }
            if (done) {
                if (dMin[r] < firedDist) { fired = r; firedDist = dMin[r]; }
                for (let i = 1; i <= m; i++) {
                    if (starts[r][i] <= tE[r]) costs[r][i] = Infinity;
                }
                dMin[r] = Infinity;
            }
        }

        const len = t - starts[r][m] + 1;
        if (costs[r][m] <= REF_THRESHOLDS[r] && costs[r][m] < dMin[r] && len >= REF_MIN_LEN[r] && len <= REF_MAX_LEN[r]) {
            dMin[r] = costs[r][m];
            tE[r] = t;
        }
    }
    t++;
    return fired;
}

// Replace with the sensors the model was trained on.
function readSample(): number[] {
    const axes = [Dimension.X, Dimension.Y, Dimension.Z];
    const x: number[] = [];
    for (let k = 0; k < DIM; k++) x.push(k < 3 ? input.acceleration(axes[k]) : 0);
    return x;
}

basic.forever(function () {
    const r = feedSample(readSample());
    if (r >= 0) basic.showString(REF_NAMES[r]);
    basic.pause(1000 / SAMPLE_RATE);
});
"#;
