#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{}-{}", prefix, nanos));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradebookd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradebookd");
    let stdin = child.stdin.take().expect("stdin");
    let stdout = child.stdout.take().expect("stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let req = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", req).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or(serde_json::Value::Null)
}

pub fn request_err_code(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .pointer("/error/code")
        .and_then(|v| v.as_str())
        .expect("error code")
        .to_string()
}

pub fn str_field(v: &serde_json::Value, key: &str) -> String {
    v.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| panic!("missing {} in {}", key, v))
        .to_string()
}

/// Request ids only need to be unique per call; a counter keeps call sites short.
pub struct Session {
    pub child: Child,
    pub stdin: ChildStdin,
    pub reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Session {
    pub fn open(prefix: &str) -> Self {
        let workspace = temp_dir(prefix);
        let (child, stdin, reader) = spawn_sidecar();
        let mut s = Self {
            child,
            stdin,
            reader,
            next_id: 0,
        };
        s.ok(
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        s
    }

    fn id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }

    pub fn call(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let id = self.id();
        request(&mut self.stdin, &mut self.reader, &id, method, params)
    }

    pub fn ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let id = self.id();
        request_ok(&mut self.stdin, &mut self.reader, &id, method, params)
    }

    pub fn err_code(&mut self, method: &str, params: serde_json::Value) -> String {
        let id = self.id();
        request_err_code(&mut self.stdin, &mut self.reader, &id, method, params)
    }

    pub fn create_class(&mut self, name: &str) -> String {
        let r = self.ok("classes.create", json!({ "name": name }));
        str_field(&r, "classId")
    }

    pub fn create_student(&mut self, class_id: &str, last: &str, first: &str) -> String {
        let r = self.ok(
            "students.create",
            json!({ "classId": class_id, "lastName": last, "firstName": first }),
        );
        str_field(&r, "studentId")
    }

    pub fn create_subject(&mut self, name: &str, code: &str, credit: f64) -> String {
        let r = self.ok(
            "subjects.create",
            json!({ "name": name, "code": code, "credit": credit }),
        );
        str_field(&r, "subjectId")
    }

    pub fn create_assessment(
        &mut self,
        class_id: &str,
        subject_id: &str,
        title: &str,
        max_score: f64,
        weight: f64,
    ) -> String {
        let r = self.ok(
            "assessments.create",
            json!({
                "classId": class_id,
                "subjectId": subject_id,
                "title": title,
                "maxScore": max_score,
                "weight": weight
            }),
        );
        str_field(&r, "assessmentId")
    }

    pub fn grade(&mut self, assessment_id: &str, student_id: &str, score: f64) -> serde_json::Value {
        self.ok(
            "grades.upsert",
            json!({ "assessmentId": assessment_id, "studentId": student_id, "score": score }),
        )
    }

    pub fn publish(&mut self, assessment_id: &str) -> serde_json::Value {
        self.ok("grades.publish", json!({ "assessmentId": assessment_id }))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
