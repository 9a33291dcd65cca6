//! Test fixtures: small documents and ready-made upload forms.

use axum_test::multipart::{MultipartForm, Part};

/// Minimal PDF.
pub fn create_test_pdf() -> Vec<u8> {
    b"%PDF-1.4
1 0 obj
<< /Type /Catalog /Pages 2 0 R >>
endobj
2 0 obj
<< /Type /Pages /Kids [] /Count 0 >>
endobj
trailer
<< /Root 1 0 R >>
%%EOF
"
    .to_vec()
}

/// Upload form with a file part and the usual text fields.
pub fn upload_form(
    bytes: Vec<u8>,
    file_name: &str,
    mime_type: &str,
    course: &str,
    subject: &str,
) -> MultipartForm {
    MultipartForm::new()
        .add_text("course", course.to_string())
        .add_text("semester", "5")
        .add_text("subject", subject.to_string())
        .add_text("description", "Unit 1 to 3")
        .add_part(
            "file",
            Part::bytes(bytes)
                .file_name(file_name.to_string())
                .mime_type(mime_type.to_string()),
        )
}

/// The standard `notes.pdf` upload for DBMS in CSE.
pub fn notes_pdf_form() -> MultipartForm {
    upload_form(
        create_test_pdf(),
        "notes.pdf",
        "application/pdf",
        "CSE",
        "DBMS",
    )
}
