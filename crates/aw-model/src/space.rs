//! Booster hyperparameter ranges searched by default.

use aw_optimizer::{HyperparameterConfig, ParameterValue, SearchSpace};

/// The six booster parameters tuned by the pack: eta, max_depth, subsample,
/// colsample_bytree, alpha and lambda.
pub fn default_search_space() -> SearchSpace {
    SearchSpace::new()
        .add_float("eta", 0.01, 0.3)
        .add_int("max_depth", 3, 10)
        .add_float("subsample", 0.5, 1.0)
        .add_float("colsample_bytree", 0.5, 1.0)
        .add_float("alpha", 0.0, 10.0)
        .add_float("lambda", 0.0, 10.0)
}

/// Library-default booster settings, usable to seed wolf 0.
pub fn default_initial_config() -> HyperparameterConfig {
    HyperparameterConfig::new()
        .with("eta", ParameterValue::Float(0.3))
        .with("max_depth", ParameterValue::Int(6))
        .with("subsample", ParameterValue::Float(1.0))
        .with("colsample_bytree", ParameterValue::Float(1.0))
        .with("alpha", ParameterValue::Float(0.0))
        .with("lambda", ParameterValue::Float(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booster::BoosterParams;

    #[test]
    fn default_space_is_valid_and_decodes_to_booster_params() {
        let space = default_search_space();
        assert!(space.validate().is_ok());
        assert_eq!(space.dimensions(), 6);

        let upper: Vec<f64> = space.bounds().iter().map(|&(_, high)| high).collect();
        let config = space.decode(&upper).unwrap();
        let params = BoosterParams::from_config(&config, &BoosterParams::default()).unwrap();
        assert_eq!(params.max_depth, 10);
        assert_eq!(params.subsample, 1.0);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn initial_config_round_trips_through_the_space() {
        let space = default_search_space();
        let initial = default_initial_config();
        let position = space.encode(&initial).unwrap();
        assert_eq!(space.decode(&position).unwrap(), initial);
    }
}
