use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use serde::Serialize;
use tracing::{debug, info};

use crate::docx::TemplateDocument;
use crate::fields::{extract_fields, TemplateFields, WeekdayLocale};
use crate::filler::{fill_document, FillValues};
use crate::questions::QuestionGenerator;
use crate::store::{DocumentStore, OutputDir};

pub const TEMPLATE_EXTENSION: &str = ".docx";
pub const FILLED_SUFFIX: &str = "_Filled";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum QuestionType {
    #[serde(rename = "Dropdown")]
    Dropdown,
    #[serde(rename = "Single Line Text")]
    SingleLineText,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuestionSpec {
    pub question: String,
    pub options: Vec<String>,
    #[serde(rename = "type")]
    pub kind: QuestionType,
}

impl QuestionSpec {
    fn free_text(question: String) -> Self {
        Self {
            question,
            options: Vec::new(),
            kind: QuestionType::SingleLineText,
        }
    }
}

/// Template file name without its `.docx` extension (case-insensitive).
pub fn display_name(file_name: &str) -> &str {
    let n = TEMPLATE_EXTENSION.len();
    if file_name.len() >= n
        && file_name.is_char_boundary(file_name.len() - n)
        && file_name[file_name.len() - n..].eq_ignore_ascii_case(TEMPLATE_EXTENSION)
    {
        &file_name[..file_name.len() - n]
    } else {
        file_name
    }
}

/// `Vertrag.docx` -> `Vertrag_Filled.docx`.
pub fn filled_file_name(template: &str) -> String {
    let path = Path::new(template);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| template.to_string());
    match path.extension() {
        Some(ext) => format!("{stem}{FILLED_SUFFIX}.{}", ext.to_string_lossy()),
        None => format!("{stem}{FILLED_SUFFIX}"),
    }
}

pub struct TemplateService {
    store: Arc<dyn DocumentStore>,
    generator: Arc<dyn QuestionGenerator>,
    output: OutputDir,
    locale: WeekdayLocale,
}

impl TemplateService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        generator: Arc<dyn QuestionGenerator>,
        output: OutputDir,
        locale: WeekdayLocale,
    ) -> Self {
        Self {
            store,
            generator,
            output,
            locale,
        }
    }

    /// `.docx` files in the template folder, in store order.
    pub async fn list_templates(&self) -> anyhow::Result<Vec<String>> {
        let files = self.store.list_files().await.context("list templates")?;
        Ok(files
            .into_iter()
            .filter(|f| f.to_lowercase().ends_with(TEMPLATE_EXTENSION))
            .collect())
    }

    pub async fn list_display_names(&self) -> anyhow::Result<Vec<String>> {
        Ok(self
            .list_templates()
            .await?
            .iter()
            .map(|t| display_name(t).to_string())
            .collect())
    }

    /// Display names, filtered by case-insensitive substring when `query` is non-empty.
    pub async fn search_templates(&self, query: Option<&str>) -> anyhow::Result<Vec<String>> {
        let names = self.list_display_names().await?;
        Ok(match query.filter(|q| !q.is_empty()) {
            Some(q) => {
                let q = q.to_lowercase();
                names
                    .into_iter()
                    .filter(|n| n.to_lowercase().contains(&q))
                    .collect()
            }
            None => names,
        })
    }

    /// Asks the model for the template that best fits `query`, and insists the answer is
    /// one of the listed templates.
    pub async fn match_template(&self, query: &str) -> anyhow::Result<String> {
        let templates = self.list_templates().await?;
        if templates.is_empty() {
            return Err(anyhow!("no templates available"));
        }
        let answer = self.generator.best_template_match(query, &templates).await?;
        let answer = answer.trim().trim_matches(|c| c == '"' || c == '\'' || c == '`').trim();
        templates
            .iter()
            .find(|t| t.as_str() == answer)
            .or_else(|| templates.iter().find(|t| t.eq_ignore_ascii_case(answer)))
            .or_else(|| {
                templates
                    .iter()
                    .find(|t| display_name(t).eq_ignore_ascii_case(answer))
            })
            .cloned()
            .ok_or_else(|| anyhow!("model suggested an unknown template: {answer}"))
    }

    async fn load(&self, template: &str) -> anyhow::Result<TemplateDocument> {
        let bytes = self
            .store
            .download_file(template)
            .await
            .with_context(|| format!("download template {template}"))?;
        TemplateDocument::from_bytes(&bytes).with_context(|| format!("open template {template}"))
    }

    pub async fn inspect_template(&self, template: &str) -> anyhow::Result<TemplateFields> {
        let doc = self.load(template).await?;
        Ok(extract_fields(&doc.document, self.locale))
    }

    /// One question per generated `(placeholder, question)` pair, then one per schedule key.
    /// Checkbox options are offered on every placeholder question. Explicit `placeholders`
    /// replace the extracted set.
    pub async fn build_questions(
        &self,
        template: &str,
        placeholders: Option<Vec<String>>,
    ) -> anyhow::Result<Vec<QuestionSpec>> {
        let fields = self.inspect_template(template).await?;
        let placeholders: Vec<String> = match placeholders {
            Some(p) if !p.is_empty() => p,
            _ => fields.placeholders.into_iter().collect(),
        };

        let pairs = if placeholders.is_empty() {
            Vec::new()
        } else {
            self.generator
                .questions_for_placeholders(&placeholders)
                .await
                .context("generate questions")?
        };
        let options = fields.checkbox_options;
        let kind = if options.is_empty() {
            QuestionType::SingleLineText
        } else {
            QuestionType::Dropdown
        };
        let mut out: Vec<QuestionSpec> = pairs
            .into_iter()
            .map(|(_, question)| QuestionSpec {
                question,
                options: options.clone(),
                kind,
            })
            .collect();
        out.extend(fields.schedule_fields.into_iter().map(QuestionSpec::free_text));
        debug!(template, questions = out.len(), "built questions");
        Ok(out)
    }

    /// Fills the template and writes `{stem}_Filled.{ext}` to the output folder.
    pub async fn fill_template(
        &self,
        template: &str,
        values: &FillValues,
    ) -> anyhow::Result<PathBuf> {
        let mut doc = self.load(template).await?;
        let summary = fill_document(&mut doc.document, values, self.locale);
        let bytes = doc.to_bytes().with_context(|| format!("serialize {template}"))?;
        let path = self.output.save(&filled_file_name(template), &bytes).await?;
        info!(
            template,
            output = %path.display(),
            paragraphs = summary.paragraphs_rewritten,
            schedule_cells = summary.schedule_cells_set,
            "filled template"
        );
        Ok(path)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::docx::testutil::{docx_bytes, para_xml, table_xml};

    pub(crate) struct FakeStore {
        pub files: HashMap<String, Vec<u8>>,
        pub order: Vec<String>,
    }

    impl FakeStore {
        pub fn new(files: Vec<(&str, Vec<u8>)>) -> Self {
            Self {
                order: files.iter().map(|(n, _)| n.to_string()).collect(),
                files: files.into_iter().map(|(n, b)| (n.to_string(), b)).collect(),
            }
        }
    }

    #[async_trait]
    impl DocumentStore for FakeStore {
        async fn list_files(&self) -> anyhow::Result<Vec<String>> {
            Ok(self.order.clone())
        }

        async fn download_file(&self, name: &str) -> anyhow::Result<Vec<u8>> {
            self.files
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow!("template not found: {name}"))
        }
    }

    /// Answers `"{placeholder}:::Q {placeholder}?"` and records what it was asked.
    #[derive(Default)]
    pub(crate) struct FakeGenerator {
        pub match_answer: String,
        pub asked: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl QuestionGenerator for FakeGenerator {
        async fn best_template_match(
            &self,
            _user_query: &str,
            _templates: &[String],
        ) -> anyhow::Result<String> {
            Ok(self.match_answer.clone())
        }

        async fn questions_for_placeholders(
            &self,
            placeholders: &[String],
        ) -> anyhow::Result<Vec<(String, String)>> {
            self.asked
                .lock()
                .expect("lock")
                .push(placeholders.to_vec());
            Ok(placeholders
                .iter()
                .map(|p| (p.clone(), format!("Q {p}?")))
                .collect())
        }
    }

    pub(crate) fn sample_template() -> Vec<u8> {
        let body = format!(
            "{}{}{}",
            para_xml(&["Name: <Vorname>"]),
            para_xml(&["☐ Vollzeit"]),
            table_xml(&[&["", "Montag", "Dienstag"], &["Arbeitszeit", "", ""]]),
        );
        docx_bytes(&body)
    }

    pub(crate) fn service_with(
        generator: Arc<FakeGenerator>,
        output: &Path,
    ) -> TemplateService {
        let store = FakeStore::new(vec![
            ("Vertrag.docx", sample_template()),
            ("Notes.txt", b"not a template".to_vec()),
            ("Urlaubsantrag.DOCX", sample_template()),
        ]);
        TemplateService::new(
            Arc::new(store),
            generator,
            OutputDir::new(output),
            WeekdayLocale::De,
        )
    }

    #[test]
    fn display_and_filled_names() {
        assert_eq!(display_name("Vertrag.docx"), "Vertrag");
        assert_eq!(display_name("Antrag.DOCX"), "Antrag");
        assert_eq!(display_name("readme"), "readme");
        assert_eq!(filled_file_name("Vertrag.docx"), "Vertrag_Filled.docx");
        assert_eq!(filled_file_name("a.b.docx"), "a.b_Filled.docx");
        assert_eq!(filled_file_name("plain"), "plain_Filled");
    }

    #[tokio::test]
    async fn listing_and_search() {
        let dir = tempfile::tempdir().expect("tempdir");
        let svc = service_with(Arc::new(FakeGenerator::default()), dir.path());
        assert_eq!(
            svc.list_templates().await.expect("list"),
            vec!["Vertrag.docx", "Urlaubsantrag.DOCX"]
        );
        assert_eq!(
            svc.list_display_names().await.expect("names"),
            vec!["Vertrag", "Urlaubsantrag"]
        );
        assert_eq!(
            svc.search_templates(Some("URLAUB")).await.expect("search"),
            vec!["Urlaubsantrag"]
        );
        assert!(svc.search_templates(Some("docx")).await.expect("search").is_empty());
        assert_eq!(svc.search_templates(Some("")).await.expect("search").len(), 2);
        assert_eq!(svc.search_templates(None).await.expect("search").len(), 2);
        assert!(svc.search_templates(Some("xyz")).await.expect("search").is_empty());
    }

    #[tokio::test]
    async fn questions_carry_checkbox_options_and_schedule_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let generator = Arc::new(FakeGenerator::default());
        let svc = service_with(generator.clone(), dir.path());
        let qs = svc.build_questions("Vertrag.docx", None).await.expect("questions");
        let texts: Vec<&str> = qs.iter().map(|q| q.question.as_str()).collect();
        assert_eq!(
            texts,
            vec!["Q Vorname?", "Arbeitszeit_Montag", "Arbeitszeit_Dienstag"]
        );
        assert_eq!(qs[0].kind, QuestionType::Dropdown);
        assert_eq!(qs[0].options, vec!["Vollzeit"]);
        assert_eq!(qs[1].kind, QuestionType::SingleLineText);
        assert!(qs[1].options.is_empty());

        let json = serde_json::to_value(&qs[1]).expect("json");
        assert_eq!(json["type"], "Single Line Text");
        assert_eq!(serde_json::to_value(&qs[0]).expect("json")["type"], "Dropdown");
    }

    #[tokio::test]
    async fn without_checkboxes_questions_are_free_text() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FakeStore::new(vec![(
            "Brief.docx",
            docx_bytes(&para_xml(&["Sehr geehrte/r <Anrede> <Name>,"])),
        )]);
        let svc = TemplateService::new(
            Arc::new(store),
            Arc::new(FakeGenerator::default()),
            OutputDir::new(dir.path()),
            WeekdayLocale::De,
        );
        let qs = svc.build_questions("Brief.docx", None).await.expect("questions");
        assert_eq!(qs.len(), 2);
        assert_eq!(qs[0].question, "Q Anrede?");
        assert!(qs
            .iter()
            .all(|q| q.kind == QuestionType::SingleLineText && q.options.is_empty()));
    }

    #[tokio::test]
    async fn template_without_placeholders_skips_the_model() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FakeStore::new(vec![("Leer.docx", docx_bytes(&para_xml(&["Nur Text"])))]);
        let generator = Arc::new(FakeGenerator::default());
        let svc = TemplateService::new(
            Arc::new(store),
            generator.clone(),
            OutputDir::new(dir.path()),
            WeekdayLocale::De,
        );
        assert!(svc.build_questions("Leer.docx", None).await.expect("questions").is_empty());
        assert!(generator.asked.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn explicit_placeholders_replace_extracted_ones() {
        let dir = tempfile::tempdir().expect("tempdir");
        let generator = Arc::new(FakeGenerator::default());
        let svc = service_with(generator.clone(), dir.path());
        svc.build_questions("Vertrag.docx", Some(vec!["Gehalt".to_string()]))
            .await
            .expect("questions");
        svc.build_questions("Vertrag.docx", Some(Vec::new()))
            .await
            .expect("questions");
        let asked = generator.asked.lock().expect("lock").clone();
        assert_eq!(asked, vec![vec!["Gehalt".to_string()], vec!["Vorname".to_string()]]);
    }

    #[tokio::test]
    async fn missing_template_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let svc = service_with(Arc::new(FakeGenerator::default()), dir.path());
        let err = svc.build_questions("Nope.docx", None).await.expect_err("missing");
        assert!(format!("{err:#}").contains("Nope.docx"));
    }

    #[tokio::test]
    async fn fill_writes_filled_copy() {
        let dir = tempfile::tempdir().expect("tempdir");
        let svc = service_with(Arc::new(FakeGenerator::default()), dir.path());
        let values: FillValues = serde_json::from_value(serde_json::json!({
            "answers": {"Vorname": "Anna"},
            "selected_checkboxes": ["Vollzeit"],
            "schedule_values": {"Arbeitszeit_Montag": "8-16"}
        }))
        .expect("values");
        let path = svc.fill_template("Vertrag.docx", &values).await.expect("fill");
        assert_eq!(path, dir.path().join("Vertrag_Filled.docx"));

        let filled = TemplateDocument::open(&path).expect("reopen");
        let texts: Vec<String> = filled.document.all_paragraphs().map(|p| p.text()).collect();
        assert!(texts.contains(&"Name: Anna".to_string()));
        assert!(texts.contains(&"☑ Vollzeit".to_string()));
        assert!(texts.contains(&"8-16".to_string()));
    }

    #[tokio::test]
    async fn match_accepts_only_listed_templates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let generator = Arc::new(FakeGenerator {
            match_answer: " \"urlaubsantrag.docx\"\n".to_string(),
            ..Default::default()
        });
        let svc = service_with(generator, dir.path());
        assert_eq!(
            svc.match_template("Urlaub beantragen").await.expect("match"),
            "Urlaubsantrag.DOCX"
        );

        let generator = Arc::new(FakeGenerator {
            match_answer: "Something.docx".to_string(),
            ..Default::default()
        });
        let svc = service_with(generator, dir.path());
        assert!(svc.match_template("x").await.is_err());
    }
}
