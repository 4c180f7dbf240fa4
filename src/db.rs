//! Database module - PostgreSQL connection and migrations

use sqlx::{postgres::PgPoolOptions, PgPool};

/// Create database connection pool
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Multi-statement script, so it goes through the simple query protocol
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .await?;

    tracing::info!("Database schema applied successfully");
    Ok(())
}

/// Database schema SQL
///
/// Courses, modules, activities, submissions and quiz templates are written by
/// the course management service; they are declared here so a fresh database
/// can serve this service on its own.
const SCHEMA_SQL: &str = r#"
-- Courses (owned by a professor)
CREATE TABLE IF NOT EXISTS courses (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    owner_id UUID NOT NULL,
    name VARCHAR(120) NOT NULL,
    code VARCHAR(50) NOT NULL,
    created_at TIMESTAMPTZ DEFAULT NOW()
);

-- Modules
CREATE TABLE IF NOT EXISTS modules (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    course_id UUID NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
    title VARCHAR(120) NOT NULL
);

-- Activities
CREATE TABLE IF NOT EXISTS activities (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    module_id UUID NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
    title VARCHAR(160) NOT NULL,
    points INT NOT NULL DEFAULT 100,
    requires_monitoring BOOLEAN NOT NULL DEFAULT true,
    exam_mode VARCHAR(10) NOT NULL DEFAULT 'quiz'
);

-- Submissions (file uploads, graded by the course owner)
CREATE TABLE IF NOT EXISTS submissions (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    activity_id UUID NOT NULL REFERENCES activities(id) ON DELETE CASCADE,
    student_id UUID NOT NULL,
    file_url TEXT NOT NULL,
    grade DOUBLE PRECISION,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Quiz templates
CREATE TABLE IF NOT EXISTS evaluations (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    activity_id UUID NOT NULL UNIQUE REFERENCES activities(id) ON DELETE CASCADE,
    title VARCHAR(160) NOT NULL DEFAULT 'Evaluation',
    created_at TIMESTAMPTZ DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS questions (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    evaluation_id UUID NOT NULL REFERENCES evaluations(id) ON DELETE CASCADE,
    kind VARCHAR(10) NOT NULL DEFAULT 'single',
    text TEXT NOT NULL,
    points INT NOT NULL DEFAULT 1 CHECK (points >= 0)
);

CREATE TABLE IF NOT EXISTS choices (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    question_id UUID NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
    text VARCHAR(300) NOT NULL,
    is_correct BOOLEAN NOT NULL DEFAULT false
);

-- Evaluation/attention split (single row)
CREATE TABLE IF NOT EXISTS grading_weights (
    id INT PRIMARY KEY CHECK (id = 1),
    evaluation_weight INT NOT NULL CHECK (evaluation_weight BETWEEN 0 AND 100),
    attention_weight INT NOT NULL CHECK (attention_weight BETWEEN 0 AND 100),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CHECK (evaluation_weight + attention_weight = 100)
);

-- Monitoring sessions (average kept on the 0..100 scale)
CREATE TABLE IF NOT EXISTS monitoring_sessions (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    student_id UUID NOT NULL,
    started_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    ended_at TIMESTAMPTZ,
    average_percent DOUBLE PRECISION NOT NULL DEFAULT 0
        CHECK (average_percent BETWEEN 0 AND 100)
);

-- Attention samples
CREATE TABLE IF NOT EXISTS attention_samples (
    id BIGSERIAL PRIMARY KEY,
    session_id UUID NOT NULL REFERENCES monitoring_sessions(id) ON DELETE CASCADE,
    score INT NOT NULL CHECK (score BETWEEN 0 AND 100),
    absent BOOLEAN NOT NULL DEFAULT false,
    reason VARCHAR(64) NOT NULL DEFAULT '',
    ear DOUBLE PRECISION,
    mar DOUBLE PRECISION,
    yaw DOUBLE PRECISION,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Activity attempts
CREATE TABLE IF NOT EXISTS activity_attempts (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    activity_id UUID NOT NULL REFERENCES activities(id) ON DELETE CASCADE,
    student_id UUID NOT NULL,
    started_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    ended_at TIMESTAMPTZ,
    monitoring_id UUID REFERENCES monitoring_sessions(id) ON DELETE SET NULL,
    monitoring_score DOUBLE PRECISION NOT NULL DEFAULT 0,
    evaluation_grade DOUBLE PRECISION,
    submission_id UUID REFERENCES submissions(id) ON DELETE SET NULL,
    final_grade DOUBLE PRECISION
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_modules_course ON modules(course_id);
CREATE INDEX IF NOT EXISTS idx_activities_module ON activities(module_id);
CREATE INDEX IF NOT EXISTS idx_submissions_activity_student ON submissions(activity_id, student_id, created_at);
CREATE INDEX IF NOT EXISTS idx_questions_evaluation ON questions(evaluation_id);
CREATE INDEX IF NOT EXISTS idx_choices_question ON choices(question_id);
CREATE INDEX IF NOT EXISTS idx_sessions_student ON monitoring_sessions(student_id, started_at);
CREATE INDEX IF NOT EXISTS idx_samples_session ON attention_samples(session_id);
CREATE INDEX IF NOT EXISTS idx_attempts_activity_student ON activity_attempts(activity_id, student_id, started_at);
CREATE INDEX IF NOT EXISTS idx_attempts_monitoring ON activity_attempts(monitoring_id);

-- At most one open session per student, one open attempt per (activity, student)
CREATE UNIQUE INDEX IF NOT EXISTS uq_sessions_open_student
    ON monitoring_sessions(student_id) WHERE ended_at IS NULL;
CREATE UNIQUE INDEX IF NOT EXISTS uq_attempts_open_pair
    ON activity_attempts(activity_id, student_id) WHERE ended_at IS NULL;
"#;
