//! SQL schema for the Matricula SQLite store.
//!
//! Executed at connection startup. The version written to
//! `PRAGMA user_version` is checked first so an older binary refuses to
//! open a newer file.

/// Schema version written to `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS` and
/// `INSERT OR IGNORE` seeds.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- ── Reference tables ───────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS regions (
    id    INTEGER PRIMARY KEY,
    name  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS comunas (
    id         INTEGER PRIMARY KEY,
    region_id  INTEGER REFERENCES regions(id),
    name       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS nationalities (
    id      INTEGER PRIMARY KEY,
    name    TEXT NOT NULL,
    active  INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS academic_years (
    id    INTEGER PRIMARY KEY,
    name  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS courses (
    id    INTEGER PRIMARY KEY,
    name  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS study_plans (
    id    INTEGER PRIMARY KEY,
    name  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS prior_schools (
    id    INTEGER PRIMARY KEY,
    name  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS relationships (
    id    INTEGER PRIMARY KEY,
    name  TEXT NOT NULL
);

-- ── People ─────────────────────────────────────────────────────────────────

-- National IDs are stored as '12345678-5', or the literal sentinels
-- 'EXTRANJERO' / 'SIN RUT'. Not unique: identity is resolved by lookup.
CREATE TABLE IF NOT EXISTS persons (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    rut             TEXT,
    given_names     TEXT NOT NULL,
    first_surname   TEXT NOT NULL,
    second_surname  TEXT NOT NULL DEFAULT '',
    sex             TEXT,
    birth_date      TEXT,            -- YYYY-MM-DD
    street          TEXT,
    house_number    TEXT,
    neighborhood    TEXT,
    unit            TEXT,
    phone           TEXT,
    email           TEXT,
    comuna_id       INTEGER REFERENCES comunas(id),
    nationality_id  INTEGER REFERENCES nationalities(id)
);

CREATE TABLE IF NOT EXISTS guardians (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    person_id         INTEGER NOT NULL UNIQUE REFERENCES persons(id),
    relationship_id   INTEGER REFERENCES relationships(id),
    employer_name     TEXT,
    job_title         TEXT,
    employer_address  TEXT,
    employer_phone    TEXT
);

CREATE TABLE IF NOT EXISTS students (
    person_id               INTEGER PRIMARY KEY REFERENCES persons(id),
    year_id                 INTEGER REFERENCES academic_years(id),
    plan_id                 INTEGER REFERENCES study_plans(id),
    prior_average           REAL,
    prior_school_id         INTEGER REFERENCES prior_schools(id),
    guardian_id             INTEGER REFERENCES guardians(id),
    indigenous_origin       INTEGER NOT NULL DEFAULT 0,
    special_education       INTEGER NOT NULL DEFAULT 0,
    physical_education      INTEGER NOT NULL DEFAULT 0,
    allergic                INTEGER NOT NULL DEFAULT 0,
    birth_certificate       INTEGER NOT NULL DEFAULT 0,
    personality_report      INTEGER NOT NULL DEFAULT 0,
    grades_report           INTEGER NOT NULL DEFAULT 0,
    annual_study_cert       INTEGER NOT NULL DEFAULT 0,
    signed_enrollment_form  INTEGER NOT NULL DEFAULT 0,
    allergy_detail          TEXT,
    current_illness         TEXT,
    medication              TEXT,
    observations            TEXT,
    authorized_pickup       TEXT
);

CREATE TABLE IF NOT EXISTS student_years (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id  INTEGER NOT NULL REFERENCES students(person_id),
    year_id     INTEGER NOT NULL REFERENCES academic_years(id),
    course_id   INTEGER REFERENCES courses(id),
    UNIQUE (student_id, year_id)
);

-- Identity columns are copied by value, not linked to persons.
CREATE TABLE IF NOT EXISTS family_members (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id          INTEGER NOT NULL REFERENCES students(person_id),
    relationship_id     INTEGER NOT NULL REFERENCES relationships(id),
    rut                 TEXT,
    given_names         TEXT NOT NULL,
    first_surname       TEXT NOT NULL,
    second_surname      TEXT NOT NULL DEFAULT '',
    birth_date          TEXT,
    sex                 TEXT,
    phone               TEXT,
    employer_name       TEXT,
    job_title           TEXT,
    employer_address    TEXT,
    employer_phone      TEXT,
    alternate_guardian  INTEGER NOT NULL DEFAULT 0,
    UNIQUE (student_id, relationship_id)
);

CREATE INDEX IF NOT EXISTS persons_rut_idx        ON persons(rut);
CREATE INDEX IF NOT EXISTS students_guardian_idx  ON students(guardian_id);
CREATE INDEX IF NOT EXISTS student_years_year_idx ON student_years(year_id, course_id);

-- ── Seeds ──────────────────────────────────────────────────────────────────

INSERT OR IGNORE INTO prior_schools (id, name) VALUES (-1, 'SIN INFORMACIÓN');

INSERT OR IGNORE INTO relationships (id, name) VALUES
    (1, 'MADRE'),
    (2, 'PADRE'),
    (3, 'ABUELO/A'),
    (4, 'TIO/A'),
    (5, 'HERMANO/A'),
    (6, 'TUTOR LEGAL'),
    (7, 'OTRO');

PRAGMA user_version = 1;
";
