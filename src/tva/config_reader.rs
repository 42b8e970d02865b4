use crate::tva::*;

use serde::{Deserialize, Serialize};

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "analysisName")]
    pub analysis_name: Option<String>,
    #[serde(rename = "outputPath")]
    pub output_path: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct GenerateSettings {
    #[serde(rename = "numVoters")]
    pub num_voters: usize,
    #[serde(rename = "numCandidates")]
    pub num_candidates: usize,
    pub seed: Option<u64>,
    #[serde(rename = "infoNoise")]
    pub info_noise: Option<f64>,
}

impl GenerateSettings {
    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            num_voters: self.num_voters,
            num_candidates: self.num_candidates,
            seed: self.seed,
            info_noise: self.info_noise,
        }
    }
}

/// Either explicit preferences or the parameters of a generated scenario.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioSettings {
    pub candidates: Option<Vec<String>>,
    pub voters: Option<Vec<Vec<String>>>,
    pub generate: Option<GenerateSettings>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct TvaRules {
    #[serde(rename = "votingScheme")]
    pub voting_scheme: Option<String>,
    #[serde(rename = "happinessFunc")]
    pub happiness_func: Option<String>,
    #[serde(rename = "strategyType")]
    pub strategy_type: Option<String>,
    #[serde(rename = "exhaustiveSearch")]
    pub exhaustive_search: Option<bool>,
    #[serde(rename = "maxCoalitionSize")]
    pub max_coalition_size: Option<usize>,
    pub repetitions: Option<usize>,
    #[serde(rename = "monteCarloSimulations")]
    pub monte_carlo_simulations: Option<usize>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct TvaConfig {
    #[serde(rename = "outputSettings", default)]
    pub output_settings: OutputSettings,
    #[serde(default)]
    pub scenario: ScenarioSettings,
    #[serde(default)]
    pub rules: TvaRules,
}

pub fn read_config(path: &str) -> TvaResult<TvaConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: TvaConfig = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

pub fn read_summary(path: &str) -> TvaResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read content: {:?}", contents);
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_explicit_scenario() {
        let js = r#"{
            "outputSettings": { "analysisName": "close race" },
            "scenario": {
                "candidates": ["A", "B", "C"],
                "voters": [["A", "B", "C"], ["B", "A", "C"], ["C", "B", "A"]]
            },
            "rules": { "votingScheme": "borda", "exhaustiveSearch": false }
        }"#;
        let config: TvaConfig = serde_json::from_str(js).unwrap();
        assert_eq!(
            config.output_settings.analysis_name,
            Some("close race".to_string())
        );
        assert_eq!(config.scenario.voters.map(|v| v.len()), Some(3));
        assert_eq!(config.rules.voting_scheme, Some("borda".to_string()));
        assert_eq!(config.rules.exhaustive_search, Some(false));
        assert_eq!(config.rules.happiness_func, None);
    }

    #[test]
    fn parses_generated_scenario() {
        let js = r#"{
            "scenario": { "generate": { "numVoters": 10, "numCandidates": 4, "infoNoise": 0.25 } },
            "rules": { "repetitions": 20 }
        }"#;
        let config: TvaConfig = serde_json::from_str(js).unwrap();
        let generate = config.scenario.generate.unwrap();
        assert_eq!(
            generate.generation_config(),
            GenerationConfig::new(10, 4).with_info_noise(0.25)
        );
        assert_eq!(config.rules.repetitions, Some(20));
        assert_eq!(config.output_settings, OutputSettings::default());
    }
}
