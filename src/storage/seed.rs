//! Demo directory rows for local development: one faculty/program, one
//! student, two supervising lecturers, one thesis. Safe to re-run — every
//! insert is `ON CONFLICT DO NOTHING` on a stable natural key.

use super::Storage;
use anyhow::{Context, Result};
use tracing::info;
use uuid::Uuid;

const DEMO_PASSWORD: &str = "password";

struct SeedUser<'a> {
    identifier: &'a str,
    role: &'a str,
    name: &'a str,
    email: &'a str,
}

impl Storage {
    pub async fn seed_demo(&self) -> Result<()> {
        let faculty_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO faculties (id, name) VALUES ($1, 'Faculty of Engineering')
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(faculty_id)
        .execute(&self.pool)
        .await?;
        let faculty_id: Uuid =
            sqlx::query_scalar("SELECT id FROM faculties WHERE name = 'Faculty of Engineering'")
                .fetch_one(&self.pool)
                .await?;

        let program_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO study_programs (id, name, degree, faculty_id)
             SELECT $1, 'Informatics', 'S1', $2
             WHERE NOT EXISTS (SELECT 1 FROM study_programs WHERE name = 'Informatics')",
        )
        .bind(program_id)
        .bind(faculty_id)
        .execute(&self.pool)
        .await?;
        let program_id: Uuid =
            sqlx::query_scalar("SELECT id FROM study_programs WHERE name = 'Informatics'")
                .fetch_one(&self.pool)
                .await?;

        let password_hash =
            bcrypt::hash(DEMO_PASSWORD, bcrypt::DEFAULT_COST).context("hashing demo password")?;

        let student = SeedUser {
            identifier: "5025211001",
            role: "student",
            name: "Alya Rachmawati",
            email: "alya@student.example.edu",
        };
        let lecturers = [
            SeedUser {
                identifier: "197805152003121002",
                role: "lecturer",
                name: "Dr. Bima Santoso",
                email: "bima@example.edu",
            },
            SeedUser {
                identifier: "198204202008012003",
                role: "lecturer",
                name: "Dr. Citra Lestari",
                email: "citra@example.edu",
            },
        ];

        sqlx::query(
            "INSERT INTO students (id, nim, name, email, study_program_id)
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT (nim) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(student.identifier)
        .bind(student.name)
        .bind(student.email)
        .bind(program_id)
        .execute(&self.pool)
        .await?;
        let student_id: Uuid = sqlx::query_scalar("SELECT id FROM students WHERE nim = $1")
            .bind(student.identifier)
            .fetch_one(&self.pool)
            .await?;

        sqlx::query(
            "INSERT INTO users (id, identifier, password_hash, role, student_id)
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT (identifier) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(student.identifier)
        .bind(&password_hash)
        .bind(student.role)
        .bind(student_id)
        .execute(&self.pool)
        .await?;

        let mut lecturer_ids = Vec::new();
        for lecturer in &lecturers {
            sqlx::query(
                "INSERT INTO lecturers (id, nip, name, email, study_program_id)
                 VALUES ($1, $2, $3, $4, $5) ON CONFLICT (nip) DO NOTHING",
            )
            .bind(Uuid::new_v4())
            .bind(lecturer.identifier)
            .bind(lecturer.name)
            .bind(lecturer.email)
            .bind(program_id)
            .execute(&self.pool)
            .await?;
            let lecturer_id: Uuid = sqlx::query_scalar("SELECT id FROM lecturers WHERE nip = $1")
                .bind(lecturer.identifier)
                .fetch_one(&self.pool)
                .await?;
            lecturer_ids.push(lecturer_id);

            sqlx::query(
                "INSERT INTO users (id, identifier, password_hash, role, lecturer_id)
                 VALUES ($1, $2, $3, $4, $5) ON CONFLICT (identifier) DO NOTHING",
            )
            .bind(Uuid::new_v4())
            .bind(lecturer.identifier)
            .bind(&password_hash)
            .bind(lecturer.role)
            .bind(lecturer_id)
            .execute(&self.pool)
            .await?;
        }

        sqlx::query(
            "INSERT INTO theses (id, title, description, progress, student_id)
             SELECT $1, 'Realtime Supervision Coordination', 'Demo thesis', 'proposal', $2
             WHERE NOT EXISTS (SELECT 1 FROM theses WHERE student_id = $2)",
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .execute(&self.pool)
        .await?;
        let thesis_id: Uuid = sqlx::query_scalar("SELECT id FROM theses WHERE student_id = $1")
            .bind(student_id)
            .fetch_one(&self.pool)
            .await?;

        for (lecturer_id, role) in lecturer_ids
            .iter()
            .zip(["primary_lecturer", "secondary_lecturer"])
        {
            sqlx::query(
                "INSERT INTO thesis_supervisors (id, thesis_id, lecturer_id, role)
                 VALUES ($1, $2, $3, $4) ON CONFLICT (thesis_id, lecturer_id) DO NOTHING",
            )
            .bind(Uuid::new_v4())
            .bind(thesis_id)
            .bind(lecturer_id)
            .bind(role)
            .execute(&self.pool)
            .await?;
        }

        info!(thesis_id = %thesis_id, "demo directory seeded (password for all demo users: \"password\")");
        Ok(())
    }
}
