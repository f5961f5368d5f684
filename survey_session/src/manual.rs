/*!

This is the long-form manual for `survey_session` and `surveyctl`.

## Form documents

Forms are stored as JSON documents, one file per form, named after the title of the form:
the title is lowercased and its spaces are replaced by underscores. The form `My Survey`
is stored in `forms/my_survey.json`:

```json
{
    "title": "Pets",
    "questions": [
        {
            "text": "Favorite animal?",
            "type": "Multiple Choice",
            "options": ["Cat", "Dog", "Bird"]
        },
        {
            "text": "Rate your day",
            "type": "Scale (1–5)"
        }
    ]
}
```

The question types are:
* `Text` free text. An empty answer is accepted unless strict validation is on.
* `Scale (1–5)` an integer between 1 and 5. `Scale (1-5)` with an ASCII hyphen is accepted when reading.
* `Multiple Choice` one of the `options`, which must be present, non-empty and trimmed.

A form is never modified once saved. Saving a second form whose title gives the same file
name is refused.

## Response ledger

The committed responses of a form are appended to `responses/<name>.csv`. The header is
written with the first response and names each column after its question:

```text
Q1: Favorite animal?,Q2: Rate your day
Dog,4
Cat,2
```

Unanswered questions are empty cells. Once written, the header does not change: a
response whose columns differ from the header (because the questions of the form
changed) is refused instead of producing misaligned rows.

## Sessions

A respondent answers one question at a time. `Previous` and `Next` move through the
questions without ever leaving the form, and the answers are kept when moving. The
responses can only be submitted from the last question.

With the permissive policy (the default), a submission goes through even with missing
answers. With the strict policy, a submission with any unanswered question, or a blank
text answer, is refused with the list of the questions to complete. The session stays
where it was.

## Summaries

For every column of the ledger:
* if every non-blank value is a number, the summary is the average and a histogram of
  the values 1 to 5.
* otherwise, the summary counts the exact values. The entries can be sorted by most
  popular (the default), least popular or alphabetically. Long values are shortened for
  display but are always grouped by their full text.

## Configuration

`surveyctl` comes with sensible defaults. They can be changed with a configuration file
in JSON, passed with `--config`:

```json
{
    "formsDirectory": "forms",
    "responsesDirectory": "responses",
    "strictValidation": false,
    "sortOrder": "most",
    "labelWidth": 40,
    "topResponses": 5
}
```

All the fields are optional. The command line flags take precedence over the file.

 */
