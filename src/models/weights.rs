//! Persisted grading weights (single row)

use serde::Deserialize;
use sqlx::PgPool;
use validator::Validate;

use crate::grading::WeightConfig;

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateWeights {
    #[validate(range(min = 0, max = 100))]
    pub evaluation_weight: i32,
    #[validate(range(min = 0, max = 100))]
    pub attention_weight: i32,
}

pub struct StoredWeights;

impl StoredWeights {
    /// `None` until an administrator saves a configuration
    pub async fn load(pool: &PgPool) -> Result<Option<WeightConfig>, sqlx::Error> {
        let row = sqlx::query_as::<_, (i32, i32)>(
            "SELECT evaluation_weight, attention_weight FROM grading_weights WHERE id = 1"
        )
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|(evaluation_weight, attention_weight)| WeightConfig {
            evaluation_weight,
            attention_weight,
        }))
    }

    pub async fn save(pool: &PgPool, weights: WeightConfig) -> Result<WeightConfig, sqlx::Error> {
        let (evaluation_weight, attention_weight) = sqlx::query_as::<_, (i32, i32)>(
            r#"
            INSERT INTO grading_weights (id, evaluation_weight, attention_weight)
            VALUES (1, $1, $2)
            ON CONFLICT (id) DO UPDATE SET
                evaluation_weight = EXCLUDED.evaluation_weight,
                attention_weight = EXCLUDED.attention_weight,
                updated_at = NOW()
            RETURNING evaluation_weight, attention_weight
            "#
        )
        .bind(weights.evaluation_weight)
        .bind(weights.attention_weight)
        .fetch_one(pool)
        .await?;

        Ok(WeightConfig { evaluation_weight, attention_weight })
    }
}
