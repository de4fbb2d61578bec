//! Read side of the workspace: loads rows and hands back the plain values
//! `calc` works on. Nothing here computes an aggregate.

use crate::calc::{AssessmentRoster, CalcError, GradeRecord, Subject};
use rusqlite::{Connection, OptionalExtension};
use std::collections::{HashMap, HashSet};

fn db_err(e: rusqlite::Error) -> CalcError {
    CalcError::new("db_query_failed", e.to_string())
}

pub fn load_subjects(conn: &Connection) -> Result<Vec<Subject>, CalcError> {
    let mut stmt = conn
        .prepare("SELECT id, name, code, credit FROM subjects ORDER BY code")
        .map_err(db_err)?;
    stmt.query_map([], |r| {
        Ok(Subject {
            id: r.get(0)?,
            name: r.get(1)?,
            code: r.get(2)?,
            credit: r.get(3)?,
        })
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(db_err)
}

pub fn student_exists(conn: &Connection, student_id: &str) -> Result<bool, CalcError> {
    conn.query_row("SELECT 1 FROM students WHERE id = ?", [student_id], |_| Ok(()))
        .optional()
        .map(|v| v.is_some())
        .map_err(db_err)
}

fn grade_record_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<GradeRecord> {
    Ok(GradeRecord {
        assessment_id: r.get(0)?,
        subject_id: r.get(1)?,
        percentage: r.get(2)?,
        weight: r.get(3)?,
        letter_grade: r.get(4)?,
        is_published: r.get::<_, i64>(5)? != 0,
    })
}

/// Published grades only; drafts never leave the store for student-facing views.
pub fn load_student_grades(conn: &Connection, student_id: &str) -> Result<Vec<GradeRecord>, CalcError> {
    let mut stmt = conn
        .prepare(
            "SELECT g.assessment_id, a.subject_id, g.percentage, a.weight, g.letter_grade, g.is_published
             FROM grades g
             JOIN assessments a ON a.id = g.assessment_id
             WHERE g.student_id = ? AND g.is_published = 1
             ORDER BY a.sort_order, a.created_at",
        )
        .map_err(db_err)?;
    stmt.query_map([student_id], grade_record_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err)
}

#[derive(Debug, Clone)]
pub struct ClassStudent {
    pub id: String,
    pub display_name: String,
    pub active: bool,
}

pub fn load_class_students(conn: &Connection, class_id: &str) -> Result<Vec<ClassStudent>, CalcError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, last_name, first_name, active
             FROM students
             WHERE class_id = ?
             ORDER BY sort_order",
        )
        .map_err(db_err)?;
    stmt.query_map([class_id], |r| {
        let last: String = r.get(1)?;
        let first: String = r.get(2)?;
        Ok(ClassStudent {
            id: r.get(0)?,
            display_name: format!("{}, {}", last, first),
            active: r.get::<_, i64>(3)? != 0,
        })
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(db_err)
}

/// Published grades of one class-subject pairing, keyed by student id.
pub fn load_class_subject_grades(
    conn: &Connection,
    class_id: &str,
    subject_id: &str,
) -> Result<HashMap<String, Vec<GradeRecord>>, CalcError> {
    let mut stmt = conn
        .prepare(
            "SELECT g.assessment_id, a.subject_id, g.percentage, a.weight, g.letter_grade, g.is_published,
                    g.student_id
             FROM grades g
             JOIN assessments a ON a.id = g.assessment_id
             WHERE a.class_id = ? AND a.subject_id = ? AND g.is_published = 1
             ORDER BY a.sort_order",
        )
        .map_err(db_err)?;
    let rows = stmt
        .query_map((class_id, subject_id), |r| {
            let student_id: String = r.get(6)?;
            Ok((student_id, grade_record_from_row(r)?))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err)?;

    let mut by_student: HashMap<String, Vec<GradeRecord>> = HashMap::new();
    for (student_id, record) in rows {
        by_student.entry(student_id).or_default().push(record);
    }
    Ok(by_student)
}

/// One roster per assessment, in class/assessment order. Enrolled means an
/// active student of the assessment's class; graded means a grade row exists,
/// published or not.
pub fn load_assessment_rosters(
    conn: &Connection,
    class_id: Option<&str>,
) -> Result<Vec<AssessmentRoster>, CalcError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, title, class_id, subject_id
             FROM assessments
             WHERE (?1 IS NULL OR class_id = ?1)
             ORDER BY class_id, sort_order",
        )
        .map_err(db_err)?;
    let assessments = stmt
        .query_map([class_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err)?;

    let mut enrolled_stmt = conn
        .prepare("SELECT id FROM students WHERE class_id = ? AND active = 1")
        .map_err(db_err)?;
    let mut graded_stmt = conn
        .prepare("SELECT student_id FROM grades WHERE assessment_id = ?")
        .map_err(db_err)?;

    let mut enrolled_by_class: HashMap<String, HashSet<String>> = HashMap::new();
    let mut out = Vec::with_capacity(assessments.len());
    for (assessment_id, title, a_class_id, subject_id) in assessments {
        if !enrolled_by_class.contains_key(&a_class_id) {
            let ids = enrolled_stmt
                .query_map([&a_class_id], |r| r.get::<_, String>(0))
                .and_then(|it| it.collect::<Result<HashSet<_>, _>>())
                .map_err(db_err)?;
            enrolled_by_class.insert(a_class_id.clone(), ids);
        }
        let enrolled = enrolled_by_class
            .get(&a_class_id)
            .cloned()
            .unwrap_or_default();
        let graded = graded_stmt
            .query_map([&assessment_id], |r| r.get::<_, String>(0))
            .and_then(|it| it.collect::<Result<HashSet<_>, _>>())
            .map_err(db_err)?;
        out.push(AssessmentRoster {
            assessment_id,
            title,
            class_id: a_class_id,
            subject_id,
            enrolled,
            graded,
        });
    }
    Ok(out)
}

pub fn load_assessment_roster(
    conn: &Connection,
    assessment_id: &str,
) -> Result<Option<AssessmentRoster>, CalcError> {
    let class_id: Option<String> = conn
        .query_row(
            "SELECT class_id FROM assessments WHERE id = ?",
            [assessment_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(db_err)?;
    let Some(class_id) = class_id else {
        return Ok(None);
    };
    Ok(load_assessment_rosters(conn, Some(&class_id))?
        .into_iter()
        .find(|r| r.assessment_id == assessment_id))
}
