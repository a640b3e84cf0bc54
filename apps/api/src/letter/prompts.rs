// Prompt constants for cover-letter generation.

/// System prompt for letter generation.
pub const LETTER_SYSTEM: &str = "You are an expert recruiter and professional writer. \
    You write short, punchy, personalised cover letters.";

/// Letter prompt template. Replace every `{placeholder}` before sending.
pub const LETTER_PROMPT_TEMPLATE: &str = r#"Write a cover letter and an email subject for a job application.

CANDIDATE: {name}, {profession} with {experience_years} years of experience
SKILLS: {skills}
EDUCATION: {education}

TARGET ROLE: {job_title} at {company}
{description_line}
INSTRUCTIONS:
1. Write a professional, catchy email SUBJECT
2. Write a cover letter of 150-200 words
3. Direct, professional and motivated tone
4. Highlight 2-3 key skills relevant to the role
5. Start directly, without a salutation such as "Dear Sir or Madam"
6. No closing formula at the end

IMPORTANT: Respond ONLY with valid JSON in this exact format (no markdown, no backticks):
{
  "subject": "The email subject here",
  "body": "The body of the cover letter here"
}"#;
