/* Copyright (C) 2022 Antmicro
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

/* Capacitor values are 8-bit, so every gain has to be expressed as a ratio of two
 * integers in [0, 255]. Ratios belonging to a single module share the reference
 * (feedback) capacitor, hence the common denominator. */

#[allow(unused)]
use crate::log::*;

pub const MAX_CAPACITOR_VALUE: u8 = 255;

pub fn round_and_clamp(number: f64, lower: i64, upper: i64) -> i64 {
    (number.round() as i64).clamp(lower, upper)
}

/// Finds numerators and a shared denominator, all within [0, 255] (the denominator
/// within [1, 255]) minimizing the sum of absolute errors of `values`.
///
/// All denominators are tried from the largest one down. A candidate replaces the
/// current best one only if its error is strictly smaller, so out of equally good
/// candidates the one with the largest denominator is returned.
pub fn approximate_ratios(values: &[f64]) -> (Vec<u8>, u8) {
    let max = MAX_CAPACITOR_VALUE as i64;

    let mut best_numerators = vec![0; values.len()];
    let mut best_denominator = MAX_CAPACITOR_VALUE;
    let mut best_delta = f64::INFINITY;

    for denominator in (1 ..= max).rev() {
        let numerators: Vec<i64> = values.iter()
            .map(|value| round_and_clamp(value * denominator as f64, 0, max))
            .collect();

        let delta: f64 = numerators.iter()
            .zip(values)
            .map(|(num, value)| (*num as f64 / denominator as f64 - value).abs())
            .sum();

        if delta < best_delta {
            best_delta = delta;
            best_denominator = denominator as u8;
            best_numerators = numerators.into_iter().map(|num| num as u8).collect();
        }
    }

    dbg_log!(
        DBG_EXTRA,
        "Approximated {:?} as {:?}/{} (error {})",
        values, best_numerators, best_denominator, best_delta
    );

    (best_numerators, best_denominator)
}

pub fn approximate_ratio(value: f64) -> (u8, u8) {
    let (numerators, denominator) = approximate_ratios(&[value]);
    (numerators[0], denominator)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_with_denominator(value: f64, denominator: i64) -> f64 {
        let num = round_and_clamp(value * denominator as f64, 0, 255);
        (num as f64 / denominator as f64 - value).abs()
    }

    #[test]
    fn test_half() {
        /* 127/254 is exact and the largest exact denominator */
        assert_eq!(approximate_ratio(0.5), (127, 254));
    }

    #[test]
    fn test_unity_and_zero() {
        assert_eq!(approximate_ratio(1.0), (255, 255));
        let (num, den) = approximate_ratio(0.0);
        assert_eq!(num, 0);
        assert_eq!(den, 255);
    }

    #[test]
    fn test_large_gain_is_clamped() {
        let (num, den) = approximate_ratio(1000.0);
        assert_eq!(num, 255);
        assert_eq!(den, 1);
    }

    #[test]
    fn test_true_minimizer() {
        for i in 0 ..= 200 {
            let gain = i as f64 / 200.0;
            let (num, den) = approximate_ratio(gain);
            assert!(den >= 1);
            let err = (num as f64 / den as f64 - gain).abs();
            for d in 1 ..= 255 {
                assert!(
                    err <= error_with_denominator(gain, d) + 1e-12,
                    "{} approximated as {}/{} but {} is a better denominator",
                    gain, num, den, d
                );
            }
        }
    }

    #[test]
    fn test_shared_denominator() {
        let (nums, den) = approximate_ratios(&[0.25, 0.75]);
        assert_eq!(nums.len(), 2);
        assert_eq!(den, 252);
        assert_eq!(nums, vec![63, 189]);
    }

    #[test]
    fn test_deterministic() {
        let a = approximate_ratios(&[0.32, 0.58]);
        let b = approximate_ratios(&[0.32, 0.58]);
        assert_eq!(a, b);
    }
}
