//! Supertrend — ATR-based directional indicator.
//!
//! Inherently sequential: final bands only tighten while price respects
//! them, and the trend flips when the close crosses the opposite band.
//! A zero ATR collapses both bands onto the bar midpoint.
//!
//! Lookback: period (same as ATR).
//!
//! Output: the active band value, which is the lower band (support) when
//! trending up and the upper band (resistance) when trending down.

use super::atr::Atr;
use super::Indicator;
use crate::domain::Bar;

/// One bar of Supertrend output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupertrendPoint {
    /// Active band; NaN during warm-up.
    pub value: f64,
    /// +1 uptrend, -1 downtrend, 0 during warm-up.
    pub trend: i8,
}

#[derive(Debug, Clone)]
pub struct Supertrend {
    period: usize,
    multiplier: f64,
    name: String,
}

impl Supertrend {
    pub fn new(period: usize, multiplier: f64) -> Self {
        assert!(period >= 1, "Supertrend period must be >= 1");
        Self {
            period,
            multiplier,
            name: format!("supertrend_{period}_{multiplier}"),
        }
    }

    /// Full output series: band value and trend direction per bar.
    pub fn series(&self, bars: &[Bar]) -> Vec<SupertrendPoint> {
        let warmup = SupertrendPoint {
            value: f64::NAN,
            trend: 0,
        };
        let mut out = vec![warmup; bars.len()];

        let atr = Atr::new(self.period).compute(bars);

        let Some(start) = atr.iter().position(|v| !v.is_nan()) else {
            return out;
        };

        let mut upper = bars[start].hl2() + self.multiplier * atr[start];
        let mut lower = bars[start].hl2() - self.multiplier * atr[start];
        let mut trending_up = true;
        out[start] = SupertrendPoint {
            value: lower,
            trend: 1,
        };

        for i in (start + 1)..bars.len() {
            let bar = &bars[i];
            if atr[i].is_nan() || bar.is_void() {
                continue;
            }

            let basic_upper = bar.hl2() + self.multiplier * atr[i];
            let basic_lower = bar.hl2() - self.multiplier * atr[i];
            let prev_close = bars[i - 1].close;

            upper = if prev_close <= upper {
                basic_upper.min(upper)
            } else {
                basic_upper
            };
            lower = if prev_close >= lower {
                basic_lower.max(lower)
            } else {
                basic_lower
            };

            if trending_up && bar.close < lower {
                trending_up = false;
            } else if !trending_up && bar.close > upper {
                trending_up = true;
            }

            out[i] = if trending_up {
                SupertrendPoint {
                    value: lower,
                    trend: 1,
                }
            } else {
                SupertrendPoint {
                    value: upper,
                    trend: -1,
                }
            };
        }

        out
    }
}

impl Indicator for Supertrend {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        self.series(bars).into_iter().map(|p| p.value).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_ohlc_bars;

    fn trending(n: usize, start: f64, step: f64) -> Vec<Bar> {
        let data: Vec<_> = (0..n)
            .map(|i| {
                let base = start + i as f64 * step;
                let (open, close) = if step >= 0.0 {
                    (base - 1.0, base + 1.0)
                } else {
                    (base + 1.0, base - 1.0)
                };
                (open, base + 3.0, base - 3.0, close)
            })
            .collect();
        make_ohlc_bars(&data)
    }

    #[test]
    fn supertrend_uptrend_below_price() {
        let bars = trending(15, 100.0, 2.0);
        let series = Supertrend::new(3, 2.0).series(&bars);
        for i in 5..15 {
            assert_eq!(series[i].trend, 1, "expected uptrend at bar {i}");
            assert!(series[i].value < bars[i].close);
        }
    }

    #[test]
    fn supertrend_downtrend_flips_and_sits_above_price() {
        let bars = trending(15, 200.0, -3.0);
        let series = Supertrend::new(3, 2.0).series(&bars);
        let flipped = (5..15).any(|i| series[i].trend == -1 && series[i].value > bars[i].close);
        assert!(flipped, "supertrend should turn down in a falling market");
    }

    #[test]
    fn supertrend_warmup_is_flat() {
        let bars = trending(10, 100.0, 1.0);
        let series = Supertrend::new(3, 2.0).series(&bars);
        for point in &series[..3] {
            assert_eq!(point.trend, 0);
            assert!(point.value.is_nan());
        }
    }

    #[test]
    fn supertrend_compute_matches_series_value() {
        let bars = trending(12, 100.0, 1.5);
        let st = Supertrend::new(4, 3.0);
        let values = st.compute(&bars);
        let series = st.series(&bars);
        for (v, p) in values.iter().zip(series.iter()) {
            assert!((v.is_nan() && p.value.is_nan()) || (v - p.value).abs() < 1e-12);
        }
    }

    #[test]
    fn supertrend_too_few_bars() {
        let bars = make_ohlc_bars(&[(100.0, 105.0, 95.0, 102.0)]);
        let result = Supertrend::new(3, 2.0).compute(&bars);
        assert!(result.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn supertrend_lookback() {
        assert_eq!(Supertrend::new(14, 3.0).lookback(), 14);
    }
}
